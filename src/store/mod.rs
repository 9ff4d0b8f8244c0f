//! Lane-private key → statistics tables.

mod hash;
mod trie;

pub use hash::HashStore;
pub use trie::TrieStore;

use crate::stats::{AggregateEntry, Stats};

pub trait KeyedAggregateStore: Send + Sized {
    fn with_capacity(capacity: usize) -> Self;

    /// Folds one measurement into the entry for `key`, creating it on first
    /// sight. `hash` must come from the same [`KeyHasher`](crate::parser::KeyHasher)
    /// for every call on a store.
    fn record(&mut self, hash: u64, key: &[u8], value: i64);

    fn merge(&mut self, other: Self);

    fn get(&self, hash: u64, key: &[u8]) -> Option<&Stats>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the store. Order is unspecified.
    fn into_entries(self) -> Vec<AggregateEntry>;
}
