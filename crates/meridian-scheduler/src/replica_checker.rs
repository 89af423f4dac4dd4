//! Replica repair.
//!
//! Run inline on every heartbeat of a region with no live operator. Checks,
//! in order:
//!
//! 1. a replica reported down long enough, on a store down long enough,
//!    is removed;
//! 2. an under-replicated region gains a replica on the emptiest up store
//!    not already hosting it;
//! 3. an over-replicated region loses the follower on its worst store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use meridian_cluster::{ClusterInfo, RegionId, RegionInfo, Replica, StoreInfo};

use crate::config::ScheduleConfig;
use crate::error::ScheduleResult;
use crate::operator::{Operator, OperatorStep, ResourceKind};
use crate::selector::{select_source, select_target, storage_score};

/// Entries beyond this count trigger pruning of stale repair timestamps.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct ReplicaChecker {
    last_scheduled: Mutex<HashMap<RegionId, Instant>>,
}

impl ReplicaChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose a repair for `region`, or `None` if it is healthy or was
    /// repaired less than `replica_schedule_interval` ago.
    pub fn check(
        &self,
        cluster: &ClusterInfo,
        config: &ScheduleConfig,
        region: &RegionInfo,
    ) -> ScheduleResult<Option<Operator>> {
        if self.recently_scheduled(region.id, config.replica_schedule_interval) {
            return Ok(None);
        }

        if let Some(replica) = self.down_replica(cluster, config, region) {
            debug!(region_id = region.id, replica_id = replica.id, "removing down replica");
            return Ok(Some(repair(region, OperatorStep::RemoveReplica { replica })));
        }

        if region.replicas.len() < config.max_replicas {
            let stores = cluster.stores();
            let hosting = region.store_ids();
            let Some(target) = select_target(
                stores.iter().filter(|s| !hosting.contains(&s.id)),
                storage_score,
            ) else {
                debug!(region_id = region.id, "no store to place missing replica");
                return Ok(None);
            };
            let replica = cluster.alloc_replica(target.id)?;
            debug!(region_id = region.id, store_id = target.id, "adding missing replica");
            return Ok(Some(repair(region, OperatorStep::AddReplica { replica })));
        }

        if region.replicas.len() > config.max_replicas
            && let Some(replica) = self.worst_follower(cluster, region)
        {
            debug!(region_id = region.id, store_id = replica.store_id, "removing extra replica");
            return Ok(Some(repair(region, OperatorStep::RemoveReplica { replica })));
        }

        Ok(None)
    }

    /// Remember that a repair for `region_id` was admitted now.
    pub fn record(&self, region_id: RegionId, interval: Duration) {
        let mut last = self.last_scheduled.lock().expect("last scheduled lock");
        let now = Instant::now();
        last.insert(region_id, now);
        if last.len() > PRUNE_THRESHOLD {
            last.retain(|_, at| now.duration_since(*at) < interval);
        }
    }

    fn recently_scheduled(&self, region_id: RegionId, interval: Duration) -> bool {
        self.last_scheduled
            .lock()
            .expect("last scheduled lock")
            .get(&region_id)
            .is_some_and(|at| at.elapsed() < interval)
    }

    fn down_replica(
        &self,
        cluster: &ClusterInfo,
        config: &ScheduleConfig,
        region: &RegionInfo,
    ) -> Option<Replica> {
        let threshold = config.max_store_down_time;
        region
            .down_replicas
            .iter()
            .find(|down| {
                Duration::from_secs(down.down_seconds) >= threshold
                    && cluster
                        .get_store(down.replica.store_id)
                        .is_some_and(|s| s.down_time() >= threshold)
            })
            .map(|down| down.replica)
    }

    /// The follower on a down store, else on the fullest store.
    fn worst_follower(&self, cluster: &ClusterInfo, region: &RegionInfo) -> Option<Replica> {
        let stores: Vec<Arc<StoreInfo>> = region
            .followers()
            .filter_map(|r| cluster.get_store(r.store_id))
            .collect();
        let worst = stores
            .iter()
            .find(|s| !s.is_up())
            .or_else(|| select_source(&stores, storage_score))?;
        region.store_replica(worst.id).copied()
    }
}

fn repair(region: &RegionInfo, step: OperatorStep) -> Operator {
    Operator::new(region.id, ResourceKind::Storage, vec![step])
}
