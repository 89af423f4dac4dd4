//! meridian-scheduler — the balancing coordinator.
//!
//! Decides, for every region reported by a heartbeat, whether a corrective
//! action is needed and which one. The coordinator:
//!
//! - Runs one background task per registered scheduler, each proposing at
//!   most one operator per tick
//! - Admits proposals subject to per-kind concurrency limits, the
//!   one-operator-per-region rule, and the post-completion cool-down
//! - Advances operators one step per heartbeat via [`Coordinator::dispatch`]
//! - Repairs under-replicated and over-replicated regions inline on dispatch
//!
//! # Architecture
//!
//! ```text
//! Coordinator
//!   ├── ClusterInfo (read stores/regions, allocate replica IDs)
//!   ├── ScheduleOptions (atomically swapped ScheduleConfig)
//!   ├── OperatorTable (live operators, per-kind counts, cool-down)
//!   ├── ReplicaChecker (repair on dispatch)
//!   └── Per-scheduler slot
//!       ├── ScheduleController (scheduler + controller + adaptive interval)
//!       └── JoinHandle of the ticking task
//! ```

pub mod config;
pub mod controller;
pub mod cooldown;
pub mod coordinator;
pub mod error;
pub mod operator;
pub mod replica_checker;
pub mod round_robin;
pub mod schedule_controller;
pub mod schedulers;
pub mod selector;
pub mod stats;

mod table;

#[cfg(test)]
mod testutil;

pub use config::{ScheduleConfig, ScheduleOptions};
pub use controller::{Admission, Controller, ControllerContext};
pub use cooldown::RegionCooldown;
pub use coordinator::{Coordinator, CoordinatorSnapshot};
pub use error::{ScheduleError, ScheduleResult};
pub use operator::{
    ChangeType, Operator, OperatorState, OperatorStep, RegionCommand, ResourceKind, StepOutcome,
};
pub use replica_checker::ReplicaChecker;
pub use round_robin::RoundRobin;
pub use schedule_controller::ScheduleController;
pub use schedulers::{
    BalanceLeaderScheduler, BalanceStorageScheduler, GrantLeaderScheduler, Scheduler,
    SchedulerSpec,
};
pub use stats::SchedulerStats;
