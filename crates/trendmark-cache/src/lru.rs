//! Recency index for LRU eviction

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Tracks use order of keys; the smallest tick is the least recently used
#[derive(Debug)]
pub(crate) struct LruIndex<K> {
    order: BTreeMap<u64, K>,
    ticks: HashMap<K, u64>,
    next: u64,
}

impl<K: Clone + Eq + Hash> LruIndex<K> {
    pub(crate) fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            ticks: HashMap::new(),
            next: 0,
        }
    }

    /// Mark `key` as most recently used
    pub(crate) fn touch(&mut self, key: &K) {
        if let Some(old) = self.ticks.get(key) {
            self.order.remove(old);
        }
        self.next += 1;
        self.order.insert(self.next, key.clone());
        self.ticks.insert(key.clone(), self.next);
    }

    pub(crate) fn remove(&mut self, key: &K) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    /// Remove and return the least recently used key
    pub(crate) fn pop_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.ticks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_first() {
        let mut lru = LruIndex::new();
        lru.touch(&"a");
        lru.touch(&"b");
        lru.touch(&"c");
        lru.touch(&"a");
        lru.remove(&"c");

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.pop_oldest(), Some("b"));
        assert_eq!(lru.pop_oldest(), Some("a"));
        assert_eq!(lru.pop_oldest(), None);
    }
}
