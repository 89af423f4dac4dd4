//! ClusterInfo — the coordinator's in-memory view of stores and regions.
//!
//! Every update publishes a brand new `Arc`; readers holding an older `Arc`
//! keep a stable, fully consistent object.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::id::IdAllocator;
use crate::types::*;

/// Shared cluster snapshot fed by heartbeats and read by schedulers.
pub struct ClusterInfo {
    stores: RwLock<HashMap<StoreId, Arc<StoreInfo>>>,
    regions: RwLock<HashMap<RegionId, Arc<RegionInfo>>>,
    id_alloc: Arc<dyn IdAllocator>,
}

impl ClusterInfo {
    pub fn new(id_alloc: Arc<dyn IdAllocator>) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            regions: RwLock::new(HashMap::new()),
            id_alloc,
        }
    }

    // ── Stores ─────────────────────────────────────────────────────

    pub fn get_store(&self, id: StoreId) -> Option<Arc<StoreInfo>> {
        self.stores.read().expect("stores lock").get(&id).cloned()
    }

    /// Insert or replace a store.
    pub fn put_store(&self, store: StoreInfo) -> Arc<StoreInfo> {
        let store = Arc::new(store);
        self.stores
            .write()
            .expect("stores lock")
            .insert(store.id, store.clone());
        store
    }

    /// Apply a store heartbeat: record the stats, mark the store up and
    /// stamp the heartbeat time. Unknown stores are registered.
    pub fn put_store_stats(&self, id: StoreId, stats: StoreStats) -> Arc<StoreInfo> {
        let mut stores = self.stores.write().expect("stores lock");
        let mut store = match stores.get(&id) {
            Some(existing) => StoreInfo::clone(existing),
            None => {
                info!(store_id = id, "store registered");
                StoreInfo::new(id, "")
            }
        };
        if !store.is_up() {
            info!(store_id = id, "store back up");
        }
        store.stats = stats;
        store.state = StoreState::Up;
        store.last_heartbeat = epoch_secs();

        let store = Arc::new(store);
        stores.insert(id, store.clone());
        store
    }

    /// Mark a store down since the given unix timestamp.
    pub fn set_store_down(&self, id: StoreId, since: u64) -> ClusterResult<()> {
        let mut stores = self.stores.write().expect("stores lock");
        let existing = stores.get(&id).ok_or(ClusterError::StoreNotFound(id))?;
        let mut store = StoreInfo::clone(existing);
        store.state = StoreState::Down { since };
        stores.insert(id, Arc::new(store));
        warn!(store_id = id, since, "store marked down");
        Ok(())
    }

    /// Mark every up store whose last heartbeat is older than `timeout` as
    /// down since that heartbeat. Returns the stores that changed state.
    pub fn mark_stale_stores(&self, timeout: Duration) -> Vec<StoreId> {
        let now = epoch_secs();
        let mut stores = self.stores.write().expect("stores lock");
        let stale: Vec<StoreId> = stores
            .values()
            .filter(|s| s.is_up() && now.saturating_sub(s.last_heartbeat) > timeout.as_secs())
            .map(|s| s.id)
            .collect();
        for id in &stale {
            if let Some(existing) = stores.get(id) {
                let mut store = StoreInfo::clone(existing);
                store.state = StoreState::Down {
                    since: store.last_heartbeat,
                };
                warn!(store_id = id, last_heartbeat = store.last_heartbeat, "store heartbeat timed out");
                stores.insert(*id, Arc::new(store));
            }
        }
        stale
    }

    /// All stores, ordered by ID.
    pub fn stores(&self) -> Vec<Arc<StoreInfo>> {
        let mut stores: Vec<_> = self
            .stores
            .read()
            .expect("stores lock")
            .values()
            .cloned()
            .collect();
        stores.sort_by_key(|s| s.id);
        stores
    }

    // ── Regions ────────────────────────────────────────────────────

    pub fn get_region(&self, id: RegionId) -> Option<Arc<RegionInfo>> {
        self.regions.read().expect("regions lock").get(&id).cloned()
    }

    /// Replace the view of a region with a reported one. Returns the
    /// previous view, if any.
    pub fn put_region(&self, region: RegionInfo) -> Option<Arc<RegionInfo>> {
        let id = region.id;
        let previous = self
            .regions
            .write()
            .expect("regions lock")
            .insert(id, Arc::new(region));
        if previous.is_none() {
            debug!(region_id = id, "region added");
        }
        previous
    }

    /// All regions, ordered by ID.
    pub fn regions(&self) -> Vec<Arc<RegionInfo>> {
        self.collect_regions(|_| true)
    }

    pub fn region_count(&self) -> usize {
        self.regions.read().expect("regions lock").len()
    }

    /// Regions whose leader lives on `store_id`.
    pub fn leader_regions(&self, store_id: StoreId) -> Vec<Arc<RegionInfo>> {
        self.collect_regions(|r| r.leader_store_id() == Some(store_id))
    }

    /// Regions with a non-leader replica on `store_id`.
    pub fn follower_regions(&self, store_id: StoreId) -> Vec<Arc<RegionInfo>> {
        self.collect_regions(|r| {
            r.leader_store_id() != Some(store_id) && r.store_replica(store_id).is_some()
        })
    }

    /// Regions with any replica on `store_id`.
    pub fn regions_on_store(&self, store_id: StoreId) -> Vec<Arc<RegionInfo>> {
        self.collect_regions(|r| r.store_replica(store_id).is_some())
    }

    fn collect_regions(&self, filter: impl Fn(&RegionInfo) -> bool) -> Vec<Arc<RegionInfo>> {
        let mut regions: Vec<_> = self
            .regions
            .read()
            .expect("regions lock")
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        regions.sort_by_key(|r| r.id);
        regions
    }

    // ── Allocation ─────────────────────────────────────────────────

    /// Allocate a fresh replica descriptor on `store_id`.
    pub fn alloc_replica(&self, store_id: StoreId) -> ClusterResult<Replica> {
        if self.get_store(store_id).is_none() {
            return Err(ClusterError::StoreNotFound(store_id));
        }
        let id = self.id_alloc.alloc()?;
        debug!(store_id, replica_id = id, "replica id allocated");
        Ok(Replica::new(id, store_id))
    }
}
