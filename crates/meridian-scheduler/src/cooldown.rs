//! Short-lived per-region moratorium after an operator completes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use meridian_cluster::RegionId;

const MIN_SWEEP_THRESHOLD: usize = 64;

/// Region ID → expiry instant.
///
/// Expired entries are invisible to lookups and are swept lazily: a full
/// sweep runs only when the map doubles past the size left by the previous
/// sweep, so inserts stay amortized O(1).
#[derive(Debug)]
pub struct RegionCooldown {
    entries: HashMap<RegionId, Instant>,
    sweep_threshold: usize,
}

impl RegionCooldown {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_threshold: MIN_SWEEP_THRESHOLD,
        }
    }

    /// Protect `region_id` for `ttl`, replacing any earlier entry.
    pub fn insert(&mut self, region_id: RegionId, ttl: Duration) {
        let now = Instant::now();
        self.entries.insert(region_id, now + ttl);
        if self.entries.len() >= self.sweep_threshold {
            self.sweep_at(now);
            self.sweep_threshold = (self.entries.len() * 2).max(MIN_SWEEP_THRESHOLD);
        }
    }

    /// Whether `region_id` is still cooling down.
    pub fn contains(&self, region_id: RegionId) -> bool {
        self.entries
            .get(&region_id)
            .is_some_and(|until| *until > Instant::now())
    }

    /// Drop an entry early. Returns true if a live entry was removed.
    pub fn delete(&mut self, region_id: RegionId) -> bool {
        self.entries
            .remove(&region_id)
            .is_some_and(|until| until > Instant::now())
    }

    /// Remove every expired entry; returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, until| *until > now);
        before - self.entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RegionCooldown {
    fn default() -> Self {
        Self::new()
    }
}
