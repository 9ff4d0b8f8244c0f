//! Reader → N × (parser → aggregator) → combiner.

use std::thread::{self, ScopedJoinHandle};

use crossbeam_channel::bounded;
use tracing::{debug, info};

use crate::aggregate::{aggregate_lane, Combiner};
use crate::config::{PipelineConfig, StoreKind};
use crate::error::{BrcError, Result};
use crate::parser::{KeyHasher, LineParser, ParseCounts};
use crate::reader::{distribute, InputSource, ReadCounts};
use crate::report;
use crate::store::{HashStore, KeyedAggregateStore, TrieStore};
use crate::timing::{Stage, TimingCollector, TimingReport};

#[derive(Debug)]
pub struct Report {
    pub output: Vec<u8>,
    pub keys: usize,
    pub lines: u64,
    pub batches: u64,
    pub segments: u64,
    pub bytes: u64,
    pub timings: TimingReport,
}

pub fn run(config: &PipelineConfig) -> Result<Report> {
    config.validate()?;
    let source = InputSource::open(&config.path, config.read_mode)?;
    info!(
        path = %config.path.display(),
        bytes = source.len(),
        mapped = source.is_mapped(),
        lanes = config.lanes,
        store = ?config.store,
        percent = config.percent,
        "starting run"
    );
    match config.store {
        StoreKind::Hash => run_with::<HashStore>(config, &source),
        StoreKind::Trie => run_with::<TrieStore>(config, &source),
    }
}

struct Aggregated<S> {
    table: S,
    read: ReadCounts,
    parsed: ParseCounts,
}

fn run_with<S: KeyedAggregateStore>(config: &PipelineConfig, source: &InputSource) -> Result<Report> {
    let timings = TimingCollector::new();
    let Aggregated { table, read, parsed } = aggregate::<S>(config, source, &timings)?;

    let entries = {
        let _clock = timings.clock(Stage::Sort, None);
        let mut entries = table.into_entries();
        report::sort_entries(&mut entries);
        entries
    };
    let output = {
        let _clock = timings.clock(Stage::Format, None);
        report::render(&entries)
    };
    let keys = entries.len();
    drop(entries);

    let timings = timings.finish();
    timings.log();
    info!(keys, lines = parsed.lines, segments = read.segments, "run complete");

    Ok(Report {
        output,
        keys,
        lines: parsed.lines,
        batches: parsed.batches,
        segments: read.segments,
        bytes: read.bytes,
        timings,
    })
}

fn aggregate<S: KeyedAggregateStore>(
    config: &PipelineConfig,
    source: &InputSource,
    timings: &TimingCollector,
) -> Result<Aggregated<S>> {
    let lanes = config.lanes;
    let hasher = KeyHasher::default();

    thread::scope(|s| -> Result<Aggregated<S>> {
        let (done_tx, done_rx) = bounded::<(usize, S)>(lanes);
        let mut segment_txs = Vec::with_capacity(lanes);
        let mut parsers = Vec::with_capacity(lanes);
        let mut aggregators = Vec::with_capacity(lanes);

        for lane in 0..lanes {
            let (segment_tx, segment_rx) = bounded(config.segment_queue);
            let (batch_tx, batch_rx) = bounded(config.batch_queue);
            segment_txs.push(segment_tx);

            let mut parser = LineParser::new(lane, hasher.clone(), config.batch_size);
            let mut clock = timings.clock(Stage::Parse, Some(lane));
            parsers.push(s.spawn(move || parser.run(segment_rx, batch_tx, &mut clock)));

            let done_tx = done_tx.clone();
            let mut clock = timings.clock(Stage::Aggregate, Some(lane));
            let capacity = config.capacity_hint;
            aggregators.push(s.spawn(move || {
                let table: S = aggregate_lane(batch_rx, capacity, &mut clock);
                drop(clock);
                // The combiner only goes away when the run is already failing.
                let _ = done_tx.send((lane, table));
            }));
        }
        drop(done_tx);

        let clock = timings.clock(Stage::Read, None);
        let segments = source.segments(config.segment_size, config.percent);
        let reader = s.spawn(move || distribute(segments, segment_txs, clock));

        // Count down the lanes; merge each table as soon as it arrives.
        let mut clock = timings.clock(Stage::Merge, None);
        let mut combiner = Combiner::new();
        while combiner.absorbed() < lanes {
            let Ok((lane, table)) = clock.blocked(|| done_rx.recv()) else {
                break;
            };
            debug!(lane, keys = table.len(), "lane finished");
            combiner.absorb(table);
        }
        drop(clock);

        let read = join(reader, "reader", 0)??;
        let mut parsed = ParseCounts::default();
        for (lane, handle) in parsers.into_iter().enumerate() {
            let counts = join(handle, "parser", lane)??;
            parsed.lines += counts.lines;
            parsed.batches += counts.batches;
        }
        for (lane, handle) in aggregators.into_iter().enumerate() {
            join(handle, "aggregator", lane)?;
        }

        Ok(Aggregated {
            table: combiner.finish(),
            read,
            parsed,
        })
    })
}

fn join<T>(handle: ScopedJoinHandle<'_, T>, stage: &'static str, lane: usize) -> Result<T> {
    handle
        .join()
        .map_err(|_| BrcError::WorkerPanicked { stage, lane })
}
