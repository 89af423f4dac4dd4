//! Operators and their step state machine.
//!
//! An [`Operator`] is the in-flight plan for one region: an ordered list of
//! [`OperatorStep`]s and a cursor. Each heartbeat evaluates the current
//! step's completion predicate exactly once. A satisfied step advances the
//! cursor; an unsatisfied one re-emits the same command.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use meridian_cluster::{RegionId, RegionInfo, Replica};

/// Scheduling domain with its own concurrency limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Leader,
    Storage,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Leader, ResourceKind::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Leader => "leader",
            ResourceKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Commands ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Add,
    Remove,
}

/// Corrective action returned to the store that sent the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionCommand {
    ChangeReplica { change: ChangeType, replica: Replica },
    TransferLeader { replica: Replica },
}

// ── Steps ─────────────────────────────────────────────────────────

/// One mutation of a region's membership or leadership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperatorStep {
    AddReplica { replica: Replica },
    RemoveReplica { replica: Replica },
    TransferLeader { replica: Replica },
}

impl OperatorStep {
    /// Whether the reported region already reflects this step.
    ///
    /// An added replica that is still pending does not count as applied.
    pub fn is_finished(&self, region: &RegionInfo) -> bool {
        match self {
            OperatorStep::AddReplica { replica } => {
                region.replicas.contains(replica) && !region.is_pending(replica.id)
            }
            OperatorStep::RemoveReplica { replica } => region.replica(replica.id).is_none(),
            OperatorStep::TransferLeader { replica } => {
                region.leader_store_id() == Some(replica.store_id)
            }
        }
    }

    /// The command that asks the store to carry out this step.
    pub fn command(&self) -> RegionCommand {
        match *self {
            OperatorStep::AddReplica { replica } => RegionCommand::ChangeReplica {
                change: ChangeType::Add,
                replica,
            },
            OperatorStep::RemoveReplica { replica } => RegionCommand::ChangeReplica {
                change: ChangeType::Remove,
                replica,
            },
            OperatorStep::TransferLeader { replica } => RegionCommand::TransferLeader { replica },
        }
    }
}

impl fmt::Display for OperatorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorStep::AddReplica { replica } => {
                write!(f, "add replica {} on store {}", replica.id, replica.store_id)
            }
            OperatorStep::RemoveReplica { replica } => {
                write!(f, "remove replica {} from store {}", replica.id, replica.store_id)
            }
            OperatorStep::TransferLeader { replica } => {
                write!(f, "transfer leader to store {}", replica.store_id)
            }
        }
    }
}

// ── Operator ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorState {
    /// No step has completed yet.
    Pending,
    /// At least one step completed, some remain.
    InProgress,
    /// Every step completed.
    Done,
}

/// What a single heartbeat did to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The current step is not applied yet; send its command.
    Command(RegionCommand),
    /// The current step was applied; the cursor moved forward.
    Advanced,
    /// The last step was applied.
    Finished,
}

/// The in-flight corrective plan for one region.
#[derive(Debug, Clone, Serialize)]
pub struct Operator {
    pub region_id: RegionId,
    pub kind: ResourceKind,
    steps: Vec<OperatorStep>,
    cursor: usize,
    #[serde(skip)]
    created_at: Instant,
}

impl Operator {
    pub fn new(region_id: RegionId, kind: ResourceKind, steps: Vec<OperatorStep>) -> Self {
        Self {
            region_id,
            kind,
            steps,
            cursor: 0,
            created_at: Instant::now(),
        }
    }

    pub fn steps(&self) -> &[OperatorStep] {
        &self.steps
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The next unexecuted step, `None` once done.
    pub fn current_step(&self) -> Option<&OperatorStep> {
        self.steps.get(self.cursor)
    }

    pub fn state(&self) -> OperatorState {
        if self.cursor >= self.steps.len() {
            OperatorState::Done
        } else if self.cursor == 0 {
            OperatorState::Pending
        } else {
            OperatorState::InProgress
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self, max_wait: Duration) -> bool {
        self.age() > max_wait
    }

    /// Evaluate the current step against a freshly reported region.
    pub fn step(&mut self, region: &RegionInfo) -> StepOutcome {
        let Some(step) = self.current_step() else {
            return StepOutcome::Finished;
        };
        if !step.is_finished(region) {
            return StepOutcome::Command(step.command());
        }
        self.cursor += 1;
        if self.cursor >= self.steps.len() {
            StepOutcome::Finished
        } else {
            StepOutcome::Advanced
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} operator for region {} ({}/{} steps)",
            self.kind,
            self.region_id,
            self.cursor,
            self.steps.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(stores: &[u64], leader_store: u64) -> RegionInfo {
        let replicas: Vec<_> = stores.iter().map(|&s| Replica::new(100 + s, s)).collect();
        let leader = replicas.iter().copied().find(|r| r.store_id == leader_store);
        RegionInfo::new(1, replicas, leader)
    }

    #[test]
    fn add_replica_waits_for_pending_to_clear() {
        let new = Replica::new(104, 4);
        let step = OperatorStep::AddReplica { replica: new };

        assert!(!step.is_finished(&region(&[1, 2, 3], 1)));

        let mut pending = region(&[1, 2, 3, 4], 1);
        pending.pending_replicas.push(new);
        assert!(!step.is_finished(&pending));

        assert!(step.is_finished(&region(&[1, 2, 3, 4], 1)));
    }

    #[test]
    fn remove_and_transfer_predicates() {
        let remove = OperatorStep::RemoveReplica {
            replica: Replica::new(103, 3),
        };
        assert!(!remove.is_finished(&region(&[1, 2, 3], 1)));
        assert!(remove.is_finished(&region(&[1, 2], 1)));

        let transfer = OperatorStep::TransferLeader {
            replica: Replica::new(102, 2),
        };
        assert!(!transfer.is_finished(&region(&[1, 2, 3], 1)));
        assert!(transfer.is_finished(&region(&[1, 2, 3], 2)));
    }

    #[test]
    fn unchanged_region_repeats_command_without_advancing() {
        let new = Replica::new(104, 4);
        let mut op = Operator::new(
            1,
            ResourceKind::Storage,
            vec![OperatorStep::AddReplica { replica: new }],
        );
        let region = region(&[1, 2, 3], 1);

        let first = op.step(&region);
        let second = op.step(&region);
        assert_eq!(first, second);
        assert_eq!(
            first,
            StepOutcome::Command(RegionCommand::ChangeReplica {
                change: ChangeType::Add,
                replica: new,
            })
        );
        assert_eq!(op.cursor(), 0);
        assert_eq!(op.state(), OperatorState::Pending);
    }

    #[test]
    fn one_step_per_evaluation() {
        let new = Replica::new(104, 4);
        let old = Replica::new(103, 3);
        let mut op = Operator::new(
            1,
            ResourceKind::Storage,
            vec![
                OperatorStep::AddReplica { replica: new },
                OperatorStep::RemoveReplica { replica: old },
            ],
        );

        // Both steps already applied, but only one advances per heartbeat.
        let applied = region(&[1, 2, 4], 1);
        assert_eq!(op.step(&applied), StepOutcome::Advanced);
        assert_eq!(op.state(), OperatorState::InProgress);
        assert_eq!(op.step(&applied), StepOutcome::Finished);
        assert_eq!(op.state(), OperatorState::Done);
        assert!(op.current_step().is_none());
    }

    #[test]
    fn command_serializes_tagged() {
        let cmd = OperatorStep::TransferLeader {
            replica: Replica::new(7, 2),
        }
        .command();
        let json = serde_json::to_value(cmd).unwrap();
        assert_eq!(json["type"], "transfer_leader");
        assert_eq!(json["replica"]["store_id"], 2);
    }

    #[test]
    fn expiry_uses_age() {
        let op = Operator::new(1, ResourceKind::Leader, vec![]);
        assert!(!op.is_expired(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(op.is_expired(Duration::from_millis(1)));
    }
}
