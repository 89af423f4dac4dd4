//! Storage-usage balancing.

use tracing::debug;

use meridian_cluster::{ClusterInfo, RegionId, RegionInfo, Replica, StoreId};

use crate::config::ScheduleConfig;
use crate::error::{ScheduleError, ScheduleResult};
use crate::operator::{Operator, OperatorStep, ResourceKind};
use crate::round_robin::RoundRobin;
use crate::schedulers::{Scheduler, should_balance};
use crate::selector::{select_source, select_target, storage_score};

/// Moves one replica from the fullest store to the emptiest store that does
/// not already host the region.
pub struct BalanceStorageScheduler {
    picker: RoundRobin,
}

impl BalanceStorageScheduler {
    pub fn new() -> Self {
        Self {
            picker: RoundRobin::new(),
        }
    }
}

impl Default for BalanceStorageScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for BalanceStorageScheduler {
    fn name(&self) -> &str {
        "storage-balancer"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Storage
    }

    fn schedule(
        &self,
        cluster: &ClusterInfo,
        config: &ScheduleConfig,
        is_busy: &dyn Fn(RegionId) -> bool,
    ) -> ScheduleResult<Option<Operator>> {
        let stores = cluster.stores();
        let Some(source) = select_source(&stores, storage_score) else {
            return Ok(None);
        };
        let regions = cluster.regions_on_store(source.id);

        let candidate = self.picker.find_map(&regions, |region| {
            if is_busy(region.id) || !region.is_healthy() {
                return None;
            }
            let hosting = region.store_ids();
            let target = select_target(
                stores.iter().filter(|s| !hosting.contains(&s.id)),
                storage_score,
            )?;
            should_balance(storage_score(source), storage_score(target), 0.0, config)
                .then(|| (region.clone(), target.id))
        });
        let Some((region, target)) = candidate else {
            return Ok(None);
        };

        // Allocation failure abandons the proposal for this tick.
        let new_replica = cluster.alloc_replica(target)?;
        let steps = move_replica_steps(cluster, &region, source.id, new_replica)?;
        debug!(
            region_id = region.id,
            from = source.id,
            to = target,
            "storage balance proposed"
        );
        Ok(Some(Operator::new(region.id, ResourceKind::Storage, steps)))
    }
}

/// Add `new_replica`, hand leadership away from `source` if it leads, then
/// drop the replica on `source`.
fn move_replica_steps(
    cluster: &ClusterInfo,
    region: &RegionInfo,
    source: StoreId,
    new_replica: Replica,
) -> ScheduleResult<Vec<OperatorStep>> {
    let old = *region
        .store_replica(source)
        .ok_or(ScheduleError::ReplicaNotFound(source))?;

    let mut steps = vec![OperatorStep::AddReplica {
        replica: new_replica,
    }];
    if region.leader_store_id() == Some(source) {
        let heir = region
            .followers()
            .find(|r| {
                region.is_replica_healthy(r.id)
                    && cluster.get_store(r.store_id).is_some_and(|s| s.is_up())
            })
            .copied()
            .unwrap_or(new_replica);
        steps.push(OperatorStep::TransferLeader { replica: heir });
    }
    steps.push(OperatorStep::RemoveReplica { replica: old });
    Ok(steps)
}
