use crossbeam_channel::Receiver;
use tracing::trace;

use crate::parser::Batch;
use crate::store::KeyedAggregateStore;
use crate::timing::StageClock;

pub fn aggregate_lane<S: KeyedAggregateStore>(
    batches: Receiver<Batch<'_>>,
    capacity: usize,
    clock: &mut StageClock,
) -> S {
    let mut table = S::with_capacity(capacity);
    while let Ok(batch) = clock.blocked(|| batches.recv()) {
        for (hash, key, value) in batch.iter() {
            table.record(hash, key, value);
        }
    }
    table
}

/// Fan-in of finished lane tables, merged in whatever order lanes finish.
pub struct Combiner<S> {
    acc: Option<S>,
    absorbed: usize,
}

impl<S> Default for Combiner<S> {
    fn default() -> Self {
        Self {
            acc: None,
            absorbed: 0,
        }
    }
}

impl<S: KeyedAggregateStore> Combiner<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, table: S) {
        self.absorbed += 1;
        if let Some(acc) = self.acc.as_mut() {
            acc.merge(table);
        } else if table.is_empty() {
            trace!("skipping empty lane table");
        } else {
            // Reuse the first non-empty table in place.
            self.acc = Some(table);
        }
    }

    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    pub fn finish(self) -> S {
        self.acc.unwrap_or_else(|| S::with_capacity(0))
    }
}
