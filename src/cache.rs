//! Bounded per-pass block cache.
//!
//! Keyed by height, fixed capacity, true least-recently-used eviction:
//! a `get` refreshes the entry's recency, so a full cache evicts the entry
//! that has gone longest without being touched rather than the oldest
//! insertion. Capacities stay small (hundreds), so the recency list is a
//! plain VecDeque.

use std::collections::{HashMap, VecDeque};

use crate::rpc::RpcBlock;

#[derive(Debug)]
pub struct BlockCache {
    capacity: usize,
    entries: HashMap<u64, RpcBlock>,
    /// Heights from least to most recently used.
    recency: VecDeque<u64>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&mut self, height: u64) -> Option<RpcBlock> {
        if let Some(block) = self.entries.get(&height) {
            let block = block.clone();
            self.touch(height);
            Some(block)
        } else {
            None
        }
    }

    pub fn insert(&mut self, height: u64, block: RpcBlock) {
        if self.entries.contains_key(&height) {
            self.entries.insert(height, block);
            self.touch(height);
            return;
        }

        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.recency.pop_front() {
                self.entries.remove(&evicted);
            }
        }

        self.entries.insert(height, block);
        self.recency.push_back(height);
    }

    /// Drop a height outright; the live scan uses this when a block is
    /// re-announced after a reorg.
    pub fn invalidate(&mut self, height: u64) {
        if self.entries.remove(&height).is_some() {
            self.recency.retain(|h| *h != height);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, height: u64) {
        self.recency.retain(|h| *h != height);
        self.recency.push_back(height);
    }
}
