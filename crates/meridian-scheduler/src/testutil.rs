//! Shared fixtures for scheduler and coordinator tests.

use std::sync::Arc;

use tokio::sync::watch;

use meridian_cluster::{
    ClusterError, ClusterInfo, ClusterResult, IdAllocator, MemoryIdAllocator, RegionEpoch,
    RegionId, RegionInfo, Replica, StoreId, StoreStats, epoch_secs,
};

use crate::config::ScheduleOptions;
use crate::controller::Controller;
use crate::operator::ResourceKind;
use crate::table::OperatorTable;

/// Allocator that always fails.
pub struct OfflineAllocator;

impl IdAllocator for OfflineAllocator {
    fn alloc(&self) -> ClusterResult<u64> {
        Err(ClusterError::Allocation("allocator offline".to_string()))
    }
}

/// A cluster snapshot with helpers to shape stores and regions.
///
/// Replica IDs are `region_id * 100 + store_id`; allocated IDs start at 1000.
pub struct TestCluster {
    pub cluster: Arc<ClusterInfo>,
}

impl TestCluster {
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(MemoryIdAllocator::new(1000)))
    }

    pub fn with_failing_allocator() -> Self {
        Self::with_allocator(Arc::new(OfflineAllocator))
    }

    fn with_allocator(alloc: Arc<dyn IdAllocator>) -> Self {
        Self {
            cluster: Arc::new(ClusterInfo::new(alloc)),
        }
    }

    /// An up store with `leader_count` leaders.
    pub fn add_leader_store(&self, store_id: StoreId, leader_count: u64) {
        self.cluster.put_store_stats(
            store_id,
            StoreStats {
                leader_count,
                region_count: leader_count,
                used_ratio: 0.0,
            },
        );
    }

    /// An up store with the given storage usage.
    pub fn add_region_store(&self, store_id: StoreId, used_ratio: f64) {
        self.cluster.put_store_stats(
            store_id,
            StoreStats {
                leader_count: 0,
                region_count: 0,
                used_ratio,
            },
        );
    }

    /// Set a store's leader count, keeping its other stats.
    pub fn update_leader_count(&self, store_id: StoreId, leader_count: u64) {
        let mut stats = self.cluster.get_store(store_id).unwrap().stats;
        stats.leader_count = leader_count;
        self.cluster.put_store_stats(store_id, stats);
    }

    /// Mark a store down since `secs_ago` seconds.
    pub fn set_store_down(&self, store_id: StoreId, secs_ago: u64) {
        self.cluster
            .set_store_down(store_id, epoch_secs() - secs_ago)
            .unwrap();
    }

    pub fn replica(&self, region_id: RegionId, store_id: StoreId) -> Replica {
        Replica::new(region_id * 100 + store_id, store_id)
    }

    /// Store and return a region led by `leader` with `followers`.
    pub fn add_leader_region(
        &self,
        region_id: RegionId,
        leader: StoreId,
        followers: &[StoreId],
    ) -> RegionInfo {
        let leader = self.replica(region_id, leader);
        let mut replicas = vec![leader];
        replicas.extend(followers.iter().map(|&s| self.replica(region_id, s)));

        let mut region = RegionInfo::new(region_id, replicas, Some(leader));
        region.epoch = RegionEpoch {
            conf_ver: 1,
            version: 1,
        };
        self.cluster.put_region(region.clone());
        region
    }

    /// Move leadership of a stored region and return the new view.
    pub fn transfer_leader(&self, region_id: RegionId, store_id: StoreId) -> RegionInfo {
        let mut region = self.region(region_id);
        region.leader = region.store_replica(store_id).copied();
        self.cluster.put_region(region.clone());
        region
    }

    pub fn region(&self, region_id: RegionId) -> RegionInfo {
        RegionInfo::clone(&self.cluster.get_region(region_id).unwrap())
    }
}

/// A standalone controller over an empty table with default options.
/// Its parent sender is dropped, so `wait_allowed` reports cancellation.
pub fn test_controller(kind: ResourceKind) -> Controller {
    let (_, parent) = watch::channel(false);
    Controller::new(
        kind,
        Arc::new(OperatorTable::new()),
        Arc::new(ScheduleOptions::default()),
        parent,
    )
}

/// Busy predicate under which every region is free to schedule.
pub fn all_idle(_: RegionId) -> bool {
    false
}
