//! Ordered reassembly of fetched parts.
//!
//! Parts are reserved in admission order, filled in whatever order the fetch
//! workers finish, and handed to the consumer strictly by ascending offset:
//! only the lowest reserved offset is ever taken, and only once it is filled.
//! Every entry counts against the lookahead window from reservation until the
//! consumer takes it.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
enum Slot {
    /// Reserved, fetch not finished yet.
    Empty,
    Filled(Vec<u8>),
}

#[derive(Debug, Default)]
struct Inner {
    slots: BTreeMap<u64, Slot>,
    high_water: usize,
}

#[derive(Debug, Default)]
pub struct PartCache {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl PartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reserved or filled entries.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest number of entries held at once.
    pub fn high_water(&self) -> usize {
        self.inner.lock().high_water
    }

    /// Reserves an empty slot at `offset` if fewer than `window` entries are held.
    ///
    /// Returns false, leaving the cache untouched, when the window is full.
    pub fn try_reserve(&self, offset: u64, window: usize) -> bool {
        let mut inner = self.inner.lock();
        if inner.slots.len() >= window {
            return false;
        }
        let previous = inner.slots.insert(offset, Slot::Empty);
        debug_assert!(previous.is_none(), "offset {offset} reserved twice");
        inner.high_water = inner.high_water.max(inner.slots.len());
        true
    }

    /// Stores the fetched bytes of the part reserved at `offset`.
    pub fn fill(&self, offset: u64, bytes: Vec<u8>) {
        let mut inner = self.inner.lock();
        match inner.slots.get_mut(&offset) {
            Some(slot) => *slot = Slot::Filled(bytes),
            None => debug_assert!(false, "fill of unreserved offset {offset}"),
        }
        drop(inner);
        self.changed.notify_all();
    }

    /// Removes and returns the lowest-offset part once it is filled.
    ///
    /// Waits up to `timeout` for it; returns `None` if the lowest part is still
    /// being fetched (or nothing is reserved) when the wait ends, so the caller
    /// can check for shutdown or failure before waiting again.
    pub fn take_next_ready(&self, timeout: Duration) -> Option<(u64, Vec<u8>)> {
        let mut inner = self.inner.lock();
        if let Some(part) = Self::pop_ready(&mut inner) {
            drop(inner);
            self.changed.notify_all();
            return Some(part);
        }

        self.changed.wait_for(&mut inner, timeout);

        let part = Self::pop_ready(&mut inner);
        drop(inner);
        if part.is_some() {
            self.changed.notify_all();
        }
        part
    }

    fn pop_ready(inner: &mut Inner) -> Option<(u64, Vec<u8>)> {
        let mut entry = inner.slots.first_entry()?;
        if matches!(entry.get(), Slot::Empty) {
            return None;
        }
        let offset = *entry.key();
        match entry.remove() {
            Slot::Filled(bytes) => Some((offset, bytes)),
            Slot::Empty => None,
        }
    }

    /// Blocks until the cache changes or `timeout` passes.
    pub fn wait_for_change(&self, timeout: Duration) {
        let mut inner = self.inner.lock();
        self.changed.wait_for(&mut inner, timeout);
    }

    /// Wakes every waiter, e.g. after a fatal error has been recorded.
    pub fn wake_all(&self) {
        let _inner = self.inner.lock();
        self.changed.notify_all();
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.lock().slots.clear();
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const NO_WAIT: Duration = Duration::from_millis(0);

    #[test]
    fn test_takes_in_offset_order_regardless_of_fill_order() {
        let cache = PartCache::new();
        for offset in [0, 10, 20] {
            assert!(cache.try_reserve(offset, 8));
        }

        cache.fill(20, vec![3]);
        cache.fill(10, vec![2]);
        // Lowest offset still empty: nothing is ready.
        assert!(cache.take_next_ready(NO_WAIT).is_none());

        cache.fill(0, vec![1]);
        assert_eq!(cache.take_next_ready(NO_WAIT), Some((0, vec![1])));
        assert_eq!(cache.take_next_ready(NO_WAIT), Some((10, vec![2])));
        assert_eq!(cache.take_next_ready(NO_WAIT), Some((20, vec![3])));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_window_bounds_reservations() {
        let cache = PartCache::new();
        assert!(cache.try_reserve(0, 2));
        assert!(cache.try_reserve(5, 2));
        assert!(!cache.try_reserve(10, 2));
        assert_eq!(cache.len(), 2);

        cache.fill(0, vec![0; 5]);
        cache.take_next_ready(NO_WAIT).unwrap();
        assert!(cache.try_reserve(10, 2));
        assert_eq!(cache.high_water(), 2);
    }

    #[test]
    fn test_take_wakes_on_fill_from_other_thread() {
        let cache = Arc::new(PartCache::new());
        assert!(cache.try_reserve(0, 1));

        let filler = {
            let cache = cache.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                cache.fill(0, b"late".to_vec());
            })
        };

        let mut got = None;
        while got.is_none() {
            got = cache.take_next_ready(Duration::from_millis(200));
        }
        assert_eq!(got, Some((0, b"late".to_vec())));
        filler.join().unwrap();
    }

    #[test]
    fn test_empty_cache_times_out() {
        let cache = PartCache::new();
        assert!(cache.take_next_ready(Duration::from_millis(5)).is_none());
    }
}
