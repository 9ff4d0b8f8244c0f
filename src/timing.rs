//! Per-stage wall clock accounting. A [`StageClock`] posts one sample to the
//! [`TimingCollector`] when it is dropped.

use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Read,
    Parse,
    Aggregate,
    Merge,
    Sort,
    Format,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Read,
        Stage::Parse,
        Stage::Aggregate,
        Stage::Merge,
        Stage::Sort,
        Stage::Format,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Read => "read",
            Stage::Parse => "parse",
            Stage::Aggregate => "aggregate",
            Stage::Merge => "merge",
            Stage::Sort => "sort",
            Stage::Format => "format",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSample {
    pub stage: Stage,
    pub lane: Option<usize>,
    /// Time spent doing work, excluding `blocked`.
    pub busy: Duration,
    /// Time spent waiting on a queue.
    pub blocked: Duration,
}

pub struct StageClock {
    tx: Sender<StageSample>,
    stage: Stage,
    lane: Option<usize>,
    started: Instant,
    blocked: Duration,
}

impl StageClock {
    /// Runs `f`, accounting its duration as time spent blocked.
    #[inline]
    pub fn blocked<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.blocked += start.elapsed();
        out
    }
}

impl Drop for StageClock {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        // The collector may already be gone when a run is torn down early.
        let _ = self.tx.send(StageSample {
            stage: self.stage,
            lane: self.lane,
            busy: elapsed.saturating_sub(self.blocked),
            blocked: self.blocked,
        });
    }
}

pub struct TimingCollector {
    tx: Sender<StageSample>,
    rx: Receiver<StageSample>,
}

impl Default for TimingCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingCollector {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Starts a clock for `stage`; it reports when dropped.
    pub fn clock(&self, stage: Stage, lane: Option<usize>) -> StageClock {
        StageClock {
            tx: self.tx.clone(),
            stage,
            lane,
            started: Instant::now(),
            blocked: Duration::ZERO,
        }
    }

    /// Drains every sample posted so far. Clocks still alive are not waited on.
    pub fn finish(self) -> TimingReport {
        let Self { tx, rx } = self;
        drop(tx);
        let mut samples: Vec<StageSample> = rx.try_iter().collect();
        samples.sort_by_key(|s| (s.stage, s.lane));
        TimingReport { samples }
    }
}

/// Per-stage totals folded over lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageSummary {
    pub workers: usize,
    pub busy_total: Duration,
    pub busy_max: Duration,
    pub blocked_total: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TimingReport {
    samples: Vec<StageSample>,
}

impl TimingReport {
    pub fn samples(&self) -> &[StageSample] {
        &self.samples
    }

    pub fn summary(&self, stage: Stage) -> StageSummary {
        self.samples
            .iter()
            .filter(|s| s.stage == stage)
            .fold(StageSummary::default(), |mut acc, s| {
                acc.workers += 1;
                acc.busy_total += s.busy;
                acc.busy_max = acc.busy_max.max(s.busy);
                acc.blocked_total += s.blocked;
                acc
            })
    }

    pub fn log(&self) {
        for stage in Stage::ALL {
            let summary = self.summary(stage);
            if summary.workers == 0 {
                continue;
            }
            info!(
                stage = stage.as_str(),
                workers = summary.workers,
                busy_max = ?summary.busy_max,
                busy_total = ?summary.busy_total,
                blocked_total = ?summary.blocked_total,
                "stage timing"
            );
        }
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<10} {:>7} {:>14} {:>14} {:>14}",
            "stage", "workers", "busy (max)", "busy (sum)", "blocked (sum)"
        )?;
        for stage in Stage::ALL {
            let s = self.summary(stage);
            if s.workers == 0 {
                continue;
            }
            writeln!(
                f,
                "{:<10} {:>7} {:>14} {:>14} {:>14}",
                stage.as_str(),
                s.workers,
                format!("{:.2?}", s.busy_max),
                format!("{:.2?}", s.busy_total),
                format!("{:.2?}", s.blocked_total),
            )?;
        }
        Ok(())
    }
}
