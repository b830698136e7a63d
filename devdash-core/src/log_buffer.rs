//! Fixed-capacity ring of log entries.
//!
//! Slots are preallocated once; `add` writes into the slot at `head` and
//! advances it, overwriting the oldest entry once the ring is full. The
//! buffer never re-sorts: insertion order is its only order.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::log_entry::LogEntry;

/// Default capacity used by log views that own their buffer.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct Ring {
    slots: Vec<Option<LogEntry>>,
    head: usize,
    size: usize,
}

impl Ring {
    /// Index of the oldest held entry.
    fn start(&self) -> usize {
        let cap = self.slots.len();
        (self.head + cap - self.size) % cap
    }

    fn collect_from(&self, skip: usize) -> Vec<LogEntry> {
        let cap = self.slots.len();
        let start = self.start();
        (skip..self.size)
            .filter_map(|i| self.slots[(start + i) % cap].clone())
            .collect()
    }
}

/// Thread-safe circular log store guarded by a single reader/writer lock.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    ring: RwLock<Ring>,
}

impl LogBuffer {
    /// Create a buffer holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ring: RwLock::new(Ring {
                slots: vec![None; capacity],
                head: 0,
                size: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Ring> {
        self.ring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ring> {
        self.ring.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn add(&self, entry: LogEntry) {
        let mut ring = self.write();
        let head = ring.head;
        ring.slots[head] = Some(entry);
        ring.head = (head + 1) % self.capacity;
        if ring.size < self.capacity {
            ring.size += 1;
        }
    }

    /// All held entries, oldest first.
    pub fn lines(&self) -> Vec<LogEntry> {
        self.read().collect_from(0)
    }

    /// The most recent `min(n, len)` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let ring = self.read();
        let n = n.min(ring.size);
        ring.collect_from(ring.size - n)
    }

    pub fn len(&self) -> usize {
        self.read().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry. Slots are reset so evicted data is not retained.
    pub fn clear(&self) {
        Self::reset(&mut self.write());
    }

    /// Take every held entry, oldest first, leaving the buffer empty.
    pub fn drain(&self) -> Vec<LogEntry> {
        let mut ring = self.write();
        let entries = ring.collect_from(0);
        Self::reset(&mut ring);
        entries
    }

    fn reset(ring: &mut Ring) {
        ring.slots.iter_mut().for_each(|slot| *slot = None);
        ring.head = 0;
        ring.size = 0;
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
