use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use tracing::debug;

/// Capacity-bounded result memo with oldest-inserted eviction.
///
/// Lookups do not refresh an entry's position; only insertion order counts.
pub(crate) struct BoundedMemo<K, V> {
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedMemo<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        if self.entries.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                debug!(capacity = self.capacity, "evicted oldest memo entry");
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_inserted() {
        let mut memo = BoundedMemo::new(2);
        memo.insert("a", 1);
        memo.insert("b", 2);
        assert_eq!(memo.get(&"a"), Some(1));
        memo.insert("c", 3);

        assert_eq!(memo.len(), 2);
        assert_eq!(memo.get(&"a"), None);
        assert_eq!(memo.get(&"b"), Some(2));
        assert_eq!(memo.get(&"c"), Some(3));
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut memo = BoundedMemo::new(2);
        memo.insert("a", 1);
        memo.insert("b", 2);
        memo.insert("a", 10);
        memo.insert("c", 3);

        assert_eq!(memo.get(&"a"), None);
        assert_eq!(memo.get(&"b"), Some(2));
    }

    #[test]
    fn test_clear_twice() {
        let mut memo = BoundedMemo::new(4);
        memo.insert(1, "x");
        memo.clear();
        memo.clear();
        assert_eq!(memo.len(), 0);
        memo.insert(2, "y");
        assert_eq!(memo.get(&2), Some("y"));
    }
}
