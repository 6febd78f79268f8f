//! Per-level MRU cache of decoded nodes. Never shared across B-trees, and
//! the catalog B-tree keeps two independent instances (one for CNID-driven
//! traversals, one for name-driven ones) so they don't evict each other's
//! working set.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::node::Node;

const LEVELS: usize = 9;

struct LevelCache<K> {
    capacity: usize,
    // MRU entry at the back.
    entries: RwLock<VecDeque<(u32, Arc<Node<K>>)>>,
}

impl<K> LevelCache<K> {
    fn new(capacity: usize) -> Self {
        LevelCache {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    fn get(&self, node_number: u32) -> Option<Arc<Node<K>>> {
        let mut entries = self.entries.write().unwrap();
        let pos = entries.iter().position(|(n, _)| *n == node_number)?;
        let entry = entries.remove(pos).unwrap();
        let node = entry.1.clone();
        entries.push_back(entry);
        Some(node)
    }

    fn insert(&self, node_number: u32, node: Arc<Node<K>>) {
        let mut entries = self.entries.write().unwrap();
        if entries.iter().any(|(n, _)| *n == node_number) {
            return;
        }
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((node_number, node));
    }
}

/// Nine per-level caches, one per B-tree depth (0 = root). Level 0 always
/// holds a single entry; deeper levels hold `k * (level + 1)` entries.
pub struct NodeCache<K> {
    levels: [LevelCache<K>; LEVELS],
}

impl<K> NodeCache<K> {
    pub fn new(k: usize) -> Self {
        let levels = std::array::from_fn(|level| {
            let capacity = if level == 0 { 1 } else { k * (level + 1) };
            LevelCache::new(capacity)
        });
        NodeCache { levels }
    }

    fn level_index(level: usize) -> usize {
        level.min(LEVELS - 1)
    }

    pub fn get(&self, level: usize, node_number: u32) -> Option<Arc<Node<K>>> {
        self.levels[Self::level_index(level)].get(node_number)
    }

    pub fn insert(&self, level: usize, node_number: u32, node: Arc<Node<K>>) {
        self.levels[Self::level_index(level)].insert(node_number, node);
    }
}
