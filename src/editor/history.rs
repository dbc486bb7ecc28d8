//! History Store
//!
//! A fixed-capacity ring of past accepted command lines. Storing
//! appends at a write cursor modulo the capacity, evicting the oldest
//! entry once the ring is full. Lookup is by logical age: `get(0)` is
//! the newest entry.

/// Number of command lines retained.
pub const HISTORY_SIZE: usize = 512;

pub struct History {
    ring: Vec<Option<String>>,
    cursor: usize,
    len: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: vec![None; capacity],
            cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store a copy of `line`, evicting the oldest entry when full.
    pub fn add(&mut self, line: &str) {
        self.ring[self.cursor] = Some(line.to_string());
        self.cursor = (self.cursor + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    /// The k-th most recent entry; `None` when out of range.
    pub fn get(&self, k: usize) -> Option<&str> {
        if k >= self.len {
            return None;
        }
        let capacity = self.capacity();
        let slot = (self.cursor + capacity - 1 - k) % capacity;
        self.ring[slot].as_deref()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut history = History::new();
        history.add("one");
        assert_eq!(history.get(0), Some("one"));
        history.add("two");
        assert_eq!(history.get(0), Some("two"));
        assert_eq!(history.get(1), Some("one"));
    }

    #[test]
    fn test_out_of_range_is_absent() {
        let mut history = History::new();
        assert_eq!(history.get(0), None);
        history.add("x");
        assert_eq!(history.get(1), None);
        assert_eq!(history.get(HISTORY_SIZE), None);
    }

    #[test]
    fn test_ordering_over_many_adds() {
        let mut history = History::new();
        for i in 0..10 {
            history.add(&format!("cmd{}", i));
        }
        for i in 0..10 {
            assert_eq!(history.get(i), Some(format!("cmd{}", 9 - i).as_str()));
        }
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn test_wraparound_evicts_oldest() {
        let mut history = History::with_capacity(4);
        for i in 0..5 {
            history.add(&format!("c{}", i));
        }
        assert_eq!(history.len(), 4);
        assert_eq!(history.get(0), Some("c4"));
        // The second add survives as the oldest entry.
        assert_eq!(history.get(3), Some("c1"));
        assert_eq!(history.get(4), None);
    }

    #[test]
    fn test_full_capacity_wrap() {
        let mut history = History::new();
        for i in 0..=HISTORY_SIZE {
            history.add(&format!("line{}", i));
        }
        assert_eq!(history.len(), HISTORY_SIZE);
        assert_eq!(history.get(HISTORY_SIZE - 1), Some("line1"));
    }
}
