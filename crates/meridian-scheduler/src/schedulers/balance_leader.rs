//! Leader-count balancing.

use std::sync::Arc;

use tracing::debug;

use meridian_cluster::{ClusterInfo, RegionId, StoreInfo};

use crate::config::ScheduleConfig;
use crate::error::ScheduleResult;
use crate::operator::{Operator, OperatorStep, ResourceKind};
use crate::round_robin::RoundRobin;
use crate::schedulers::{Scheduler, should_balance};
use crate::selector::{leader_score, select_source, select_target};

/// Moves leadership off the store holding the most leaders.
///
/// Only a store that already hosts a healthy follower of the region can
/// receive its leadership.
pub struct BalanceLeaderScheduler {
    picker: RoundRobin,
}

impl BalanceLeaderScheduler {
    pub fn new() -> Self {
        Self {
            picker: RoundRobin::new(),
        }
    }
}

impl Default for BalanceLeaderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for BalanceLeaderScheduler {
    fn name(&self) -> &str {
        "leader-balancer"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Leader
    }

    fn schedule(
        &self,
        cluster: &ClusterInfo,
        config: &ScheduleConfig,
        is_busy: &dyn Fn(RegionId) -> bool,
    ) -> ScheduleResult<Option<Operator>> {
        let stores = cluster.stores();
        let Some(source) = select_source(&stores, leader_score) else {
            return Ok(None);
        };
        let regions = cluster.leader_regions(source.id);

        let op = self.picker.find_map(&regions, |region| {
            if is_busy(region.id) || !region.is_healthy() {
                return None;
            }
            let followers: Vec<Arc<StoreInfo>> = region
                .followers()
                .filter_map(|r| cluster.get_store(r.store_id))
                .collect();
            let target = select_target(&followers, leader_score)?;
            if !should_balance(leader_score(source), leader_score(target), 2.0, config) {
                return None;
            }
            let replica = *region.store_replica(target.id)?;
            debug!(
                region_id = region.id,
                from = source.id,
                to = target.id,
                "leader balance proposed"
            );
            Some(Operator::new(
                region.id,
                ResourceKind::Leader,
                vec![OperatorStep::TransferLeader { replica }],
            ))
        });
        Ok(op)
    }
}
