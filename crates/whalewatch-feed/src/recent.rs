//! Bounded recent-id set for duplicate rejection.

use std::collections::{HashSet, VecDeque};

/// FIFO set of the last N reference ids.
///
/// The feed may redeliver transactions around reconnects; this set rejects
/// replays within a bounded recent-history window. Eviction is size-based:
/// once the capacity is reached, inserting a new id evicts the oldest.
#[derive(Debug)]
pub struct RecentIdSet {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl RecentIdSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity.max(1)),
            seen: HashSet::with_capacity(capacity.max(1)),
        }
    }

    /// Insert an id. Returns false if it was already present (a duplicate).
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
