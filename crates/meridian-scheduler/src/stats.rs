//! Per-scheduler counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::operator::ResourceKind;

#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    proposed: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl SchedulerCounters {
    pub fn proposed(&self) {
        self.proposed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn admission(&self, admitted: bool) {
        let counter = if admitted { &self.admitted } else { &self.rejected };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, name: &str, kind: ResourceKind, interval_ms: u64) -> SchedulerStats {
        SchedulerStats {
            name: name.to_string(),
            kind,
            proposed: self.proposed.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            interval_ms,
        }
    }
}

/// Point-in-time view of one scheduler's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub name: String,
    pub kind: ResourceKind,
    /// Operators the scheduler proposed.
    pub proposed: u64,
    /// Proposals the coordinator admitted.
    pub admitted: u64,
    /// Proposals dropped because the region was busy, cooling down, or
    /// the kind was at its limit.
    pub rejected: u64,
    /// Ticks that ended in an error (e.g. ID allocation).
    pub failed: u64,
    /// Current tick interval.
    pub interval_ms: u64,
}
