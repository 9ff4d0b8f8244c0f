use hashbrown::hash_table::{Entry, HashTable};

use super::KeyedAggregateStore;
use crate::stats::{AggregateEntry, Stats};

struct Slot {
    hash: u64,
    entry: AggregateEntry,
}

/// Open-addressing table keyed by the parser's precomputed hash. Lookups
/// compare key bytes, so two keys sharing a hash stay separate entries.
pub struct HashStore {
    table: HashTable<Slot>,
}

impl KeyedAggregateStore for HashStore {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
        }
    }

    #[inline]
    fn record(&mut self, hash: u64, key: &[u8], value: i64) {
        match self
            .table
            .entry(hash, |slot| &*slot.entry.key == key, |slot| slot.hash)
        {
            Entry::Occupied(mut slot) => slot.get_mut().entry.stats.update(value),
            Entry::Vacant(slot) => {
                slot.insert(Slot {
                    hash,
                    entry: AggregateEntry::new(key, value),
                });
            }
        }
    }

    fn merge(&mut self, other: Self) {
        for incoming in other.table {
            let key = &incoming.entry.key;
            match self.table.find_mut(incoming.hash, |slot| slot.entry.key == *key) {
                Some(slot) => slot.entry.stats.merge(&incoming.entry.stats),
                None => {
                    self.table
                        .insert_unique(incoming.hash, incoming, |slot| slot.hash);
                }
            }
        }
    }

    fn get(&self, hash: u64, key: &[u8]) -> Option<&Stats> {
        self.table
            .find(hash, |slot| &*slot.entry.key == key)
            .map(|slot| &slot.entry.stats)
    }

    fn len(&self) -> usize {
        self.table.len()
    }

    fn into_entries(self) -> Vec<AggregateEntry> {
        self.table.into_iter().map(|slot| slot.entry).collect()
    }
}
