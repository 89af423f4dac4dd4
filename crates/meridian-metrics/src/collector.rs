//! Dispatch collector — counts heartbeats and issued commands.
//!
//! Counters are atomics; the per-store map is behind a lock taken only
//! when a store reports for the first time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use meridian_cluster::StoreId;
use meridian_scheduler::{ChangeType, RegionCommand};

#[derive(Default)]
pub struct DispatchCollector {
    region_heartbeats: AtomicU64,
    add_replica: AtomicU64,
    remove_replica: AtomicU64,
    transfer_leader: AtomicU64,
    /// Store heartbeats: store_id → count.
    store_heartbeats: RwLock<HashMap<StoreId, Arc<AtomicU64>>>,
}

/// Point-in-time copy of the collector's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub region_heartbeats: u64,
    pub add_replica: u64,
    pub remove_replica: u64,
    pub transfer_leader: u64,
    /// Sorted by store ID.
    pub store_heartbeats: Vec<(StoreId, u64)>,
}

impl DispatchCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a region heartbeat and the command returned for it.
    pub fn record_region_heartbeat(&self, command: Option<&RegionCommand>) {
        self.region_heartbeats.fetch_add(1, Ordering::Relaxed);
        let counter = match command {
            None => return,
            Some(RegionCommand::ChangeReplica {
                change: ChangeType::Add,
                ..
            }) => &self.add_replica,
            Some(RegionCommand::ChangeReplica {
                change: ChangeType::Remove,
                ..
            }) => &self.remove_replica,
            Some(RegionCommand::TransferLeader { .. }) => &self.transfer_leader,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_heartbeat(&self, store_id: StoreId) {
        let existing = self
            .store_heartbeats
            .read()
            .expect("store heartbeats lock")
            .get(&store_id)
            .cloned();
        let counter = match existing {
            Some(counter) => counter,
            None => {
                debug!(store_id, "tracking store heartbeats");
                self.store_heartbeats
                    .write()
                    .expect("store heartbeats lock")
                    .entry(store_id)
                    .or_default()
                    .clone()
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        let mut store_heartbeats: Vec<_> = self
            .store_heartbeats
            .read()
            .expect("store heartbeats lock")
            .iter()
            .map(|(id, count)| (*id, count.load(Ordering::Relaxed)))
            .collect();
        store_heartbeats.sort_unstable();

        DispatchSnapshot {
            region_heartbeats: self.region_heartbeats.load(Ordering::Relaxed),
            add_replica: self.add_replica.load(Ordering::Relaxed),
            remove_replica: self.remove_replica.load(Ordering::Relaxed),
            transfer_leader: self.transfer_leader.load(Ordering::Relaxed),
            store_heartbeats,
        }
    }
}
