//! Round-robin candidate picker.
//!
//! Schedulers visit candidate regions starting from a rotating offset so
//! consecutive ticks do not keep retrying the same region. Uses an atomic
//! counter and is safe for concurrent access.

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Select the next start index, wrapping around `count`.
    ///
    /// Returns `None` if count is zero.
    pub fn next(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(idx % count)
    }

    /// Visit `items` once, starting at the next rotating offset, and return
    /// the first value `f` produces.
    pub fn find_map<T, R>(&self, items: &[T], mut f: impl FnMut(&T) -> Option<R>) -> Option<R> {
        let start = self.next(items.len())?;
        items
            .iter()
            .cycle()
            .skip(start)
            .take(items.len())
            .find_map(|item| f(item))
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}
