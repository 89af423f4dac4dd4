//! Administrative leadership pinning.

use tracing::debug;

use meridian_cluster::{ClusterInfo, RegionId, StoreId};

use crate::config::ScheduleConfig;
use crate::error::ScheduleResult;
use crate::operator::{Operator, OperatorStep, ResourceKind};
use crate::round_robin::RoundRobin;
use crate::schedulers::Scheduler;

/// Transfers leadership of every region with a replica on `store_id` to
/// that store, regardless of balance.
pub struct GrantLeaderScheduler {
    name: String,
    store_id: StoreId,
    picker: RoundRobin,
}

impl GrantLeaderScheduler {
    pub fn new(store_id: StoreId) -> Self {
        Self {
            name: format!("grant-leader-{store_id}"),
            store_id,
            picker: RoundRobin::new(),
        }
    }
}

impl Scheduler for GrantLeaderScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Leader
    }

    fn schedule(
        &self,
        cluster: &ClusterInfo,
        _config: &ScheduleConfig,
        is_busy: &dyn Fn(RegionId) -> bool,
    ) -> ScheduleResult<Option<Operator>> {
        if !cluster.get_store(self.store_id).is_some_and(|s| s.is_up()) {
            return Ok(None);
        }
        let regions = cluster.follower_regions(self.store_id);

        let op = self.picker.find_map(&regions, |region| {
            if is_busy(region.id) {
                return None;
            }
            let replica = *region.store_replica(self.store_id)?;
            if !region.is_replica_healthy(replica.id) {
                return None;
            }
            debug!(region_id = region.id, store_id = self.store_id, "grant leader proposed");
            Some(Operator::new(
                region.id,
                ResourceKind::Leader,
                vec![OperatorStep::TransferLeader { replica }],
            ))
        });
        Ok(op)
    }
}
