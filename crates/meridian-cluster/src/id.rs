//! Replica ID allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ClusterResult;

/// Hands out cluster-unique identifiers for new replicas.
///
/// Implementations may fail (e.g. a remote allocator is unreachable); the
/// caller abandons whatever it was building when they do.
pub trait IdAllocator: Send + Sync {
    fn alloc(&self) -> ClusterResult<u64>;
}

/// Process-local allocator backed by an atomic counter.
#[derive(Debug)]
pub struct MemoryIdAllocator {
    next: AtomicU64,
}

impl MemoryIdAllocator {
    /// Start allocating at `first`.
    pub fn new(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for MemoryIdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdAllocator for MemoryIdAllocator {
    fn alloc(&self) -> ClusterResult<u64> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
