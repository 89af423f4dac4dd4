//! Scheduling policies.
//!
//! Every policy implements [`Scheduler`]: given the cluster snapshot and the
//! live config it proposes zero or one operator. Admission is decided by the
//! coordinator, never by the policy.

mod balance_leader;
mod balance_storage;
mod grant_leader;

pub use balance_leader::BalanceLeaderScheduler;
pub use balance_storage::BalanceStorageScheduler;
pub use grant_leader::GrantLeaderScheduler;

use serde::{Deserialize, Serialize};

use meridian_cluster::{ClusterInfo, RegionId, StoreId};

use crate::config::ScheduleConfig;
use crate::error::ScheduleResult;
use crate::operator::{Operator, ResourceKind};

pub trait Scheduler: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &str;

    /// Kind of the operators this scheduler proposes.
    fn kind(&self) -> ResourceKind;

    /// Propose at most one operator. Regions for which `is_busy` holds
    /// (a live operator or a cool-down) are never proposed and no replica
    /// ID is allocated for them.
    fn schedule(
        &self,
        cluster: &ClusterInfo,
        config: &ScheduleConfig,
        is_busy: &dyn Fn(RegionId) -> bool,
    ) -> ScheduleResult<Option<Operator>>;
}

/// Declarative description of a scheduler, as accepted by the admin API and
/// the daemon config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SchedulerSpec {
    LeaderBalance,
    StorageBalance,
    GrantLeader { store_id: StoreId },
}

impl SchedulerSpec {
    pub fn build(&self) -> Box<dyn Scheduler> {
        match *self {
            SchedulerSpec::LeaderBalance => Box::new(BalanceLeaderScheduler::new()),
            SchedulerSpec::StorageBalance => Box::new(BalanceStorageScheduler::new()),
            SchedulerSpec::GrantLeader { store_id } => {
                Box::new(GrantLeaderScheduler::new(store_id))
            }
        }
    }
}

/// Balance only when the gap is at least `min_diff` and its ratio to the
/// source exceeds the configured threshold.
pub(crate) fn should_balance(source: f64, target: f64, min_diff: f64, config: &ScheduleConfig) -> bool {
    source - target >= min_diff
        && crate::selector::imbalance_ratio(source, target) > config.min_balance_diff_ratio
}
