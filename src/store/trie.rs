use super::KeyedAggregateStore;
use crate::stats::{AggregateEntry, Stats};

const ROOT: usize = 0;

struct Node {
    /// Edge label leading into this node. Empty only for the root.
    label: Box<[u8]>,
    /// Child indices ordered by the first byte of their label.
    children: Vec<u32>,
    stats: Option<Stats>,
}

impl Node {
    fn new(label: &[u8]) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
            stats: None,
        }
    }
}

/// Radix tree over key bytes in a single arena. The supplied hash is ignored.
pub struct TrieStore {
    nodes: Vec<Node>,
    len: usize,
}

impl TrieStore {
    fn node_for(&mut self, key: &[u8]) -> usize {
        let mut node = ROOT;
        let mut rest = key;
        while let Some(&first) = rest.first() {
            let nodes = &self.nodes;
            let slot = nodes[node]
                .children
                .binary_search_by_key(&first, |&child| nodes[child as usize].label[0]);
            match slot {
                Err(pos) => {
                    let leaf = self.push(Node::new(rest));
                    self.nodes[node].children.insert(pos, leaf as u32);
                    return leaf;
                }
                Ok(pos) => {
                    let child = self.nodes[node].children[pos] as usize;
                    let label = &self.nodes[child].label;
                    let common = common_prefix(label, rest);
                    if common < label.len() {
                        let mut mid = Node::new(&label[..common]);
                        mid.children.push(child as u32);
                        let tail: Box<[u8]> = label[common..].into();
                        self.nodes[child].label = tail;
                        let mid = self.push(mid);
                        self.nodes[node].children[pos] = mid as u32;
                        node = mid;
                    } else {
                        node = child;
                    }
                    rest = &rest[common..];
                }
            }
        }
        node
    }

    fn find(&self, key: &[u8]) -> Option<usize> {
        let mut node = ROOT;
        let mut rest = key;
        while let Some(&first) = rest.first() {
            let children = &self.nodes[node].children;
            let pos = children
                .binary_search_by_key(&first, |&child| self.nodes[child as usize].label[0])
                .ok()?;
            let child = children[pos] as usize;
            rest = rest.strip_prefix(&*self.nodes[child].label)?;
            node = child;
        }
        Some(node)
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn fold(&mut self, key: &[u8], stats: &Stats) {
        let node = self.node_for(key);
        match self.nodes[node].stats.as_mut() {
            Some(existing) => existing.merge(stats),
            None => {
                self.nodes[node].stats = Some(*stats);
                self.len += 1;
            }
        }
    }

    // Children go on the stack reversed so they pop in byte order.
    fn walk(&self, out: &mut Vec<AggregateEntry>) {
        let mut key = Vec::new();
        let mut stack = vec![(ROOT, 0)];
        while let Some((index, mark)) = stack.pop() {
            let node = &self.nodes[index];
            key.truncate(mark);
            key.extend_from_slice(&node.label);
            if let Some(stats) = node.stats {
                out.push(AggregateEntry {
                    key: key.as_slice().into(),
                    stats,
                });
            }
            let depth = key.len();
            stack.extend(node.children.iter().rev().map(|&child| (child as usize, depth)));
        }
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl KeyedAggregateStore for TrieStore {
    fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.saturating_mul(2).max(1));
        nodes.push(Node::new(&[]));
        Self { nodes, len: 0 }
    }

    #[inline]
    fn record(&mut self, _hash: u64, key: &[u8], value: i64) {
        let node = self.node_for(key);
        match self.nodes[node].stats.as_mut() {
            Some(stats) => stats.update(value),
            None => {
                self.nodes[node].stats = Some(Stats::new(value));
                self.len += 1;
            }
        }
    }

    fn merge(&mut self, other: Self) {
        for entry in other.into_entries() {
            self.fold(&entry.key, &entry.stats);
        }
    }

    fn get(&self, _hash: u64, key: &[u8]) -> Option<&Stats> {
        self.find(key)
            .and_then(|node| self.nodes[node].stats.as_ref())
    }

    fn len(&self) -> usize {
        self.len
    }

    /// Entries come out in ascending byte order of their keys.
    fn into_entries(self) -> Vec<AggregateEntry> {
        let mut out = Vec::with_capacity(self.len);
        self.walk(&mut out);
        out
    }
}
