//! Live operator table shared by the coordinator, controllers and dispatch.
//!
//! A single lock guards the operators, the per-kind counts and the
//! cool-down cache so admission checks and step transitions are atomic
//! with respect to each other.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::sync::Notify;

use meridian_cluster::{RegionId, RegionInfo};

use crate::cooldown::RegionCooldown;
use crate::operator::{Operator, RegionCommand, ResourceKind, StepOutcome};

/// Why an operator was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    RegionBusy,
    CoolingDown,
    LimitReached,
}

/// Result of applying one heartbeat to the table.
#[derive(Debug)]
pub(crate) enum Progress {
    /// The region has no live operator.
    Idle,
    Command(RegionCommand),
    Advanced,
    Finished(Operator),
    Expired(Operator),
}

#[derive(Default)]
struct TableInner {
    operators: HashMap<RegionId, Operator>,
    counts: HashMap<ResourceKind, u64>,
    cooldown: RegionCooldown,
}

impl TableInner {
    fn take(&mut self, region_id: RegionId) -> Option<Operator> {
        let op = self.operators.remove(&region_id)?;
        if let Some(count) = self.counts.get_mut(&op.kind) {
            *count = count.saturating_sub(1);
        }
        Some(op)
    }
}

#[derive(Default)]
pub(crate) struct OperatorTable {
    inner: RwLock<TableInner>,
    /// Signalled whenever an operator leaves the table.
    released: Notify,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `op` unless its region is busy or cooling down, or its kind
    /// already has `limit` live operators.
    pub fn admit(&self, op: Operator, limit: u64) -> Result<(), Rejection> {
        let mut inner = self.inner.write().expect("operators lock");
        if inner.operators.contains_key(&op.region_id) {
            return Err(Rejection::RegionBusy);
        }
        if inner.cooldown.contains(op.region_id) {
            return Err(Rejection::CoolingDown);
        }
        let count = inner.counts.entry(op.kind).or_insert(0);
        if *count >= limit {
            return Err(Rejection::LimitReached);
        }
        *count += 1;
        inner.operators.insert(op.region_id, op);
        Ok(())
    }

    /// Drop the region's operator without entering cool-down.
    pub fn remove(&self, region_id: RegionId) -> Option<Operator> {
        let op = self.inner.write().expect("operators lock").take(region_id);
        if op.is_some() {
            self.released.notify_waiters();
        }
        op
    }

    /// Apply a reported region to its operator, if any.
    pub fn step(&self, region: &RegionInfo, cooldown: Duration, max_wait: Duration) -> Progress {
        let progress = {
            let mut inner = self.inner.write().expect("operators lock");
            let Some(op) = inner.operators.get_mut(&region.id) else {
                return Progress::Idle;
            };

            if op.is_expired(max_wait) {
                let op = inner.take(region.id);
                inner.cooldown.insert(region.id, cooldown);
                op.map_or(Progress::Idle, Progress::Expired)
            } else {
                match op.step(region) {
                    StepOutcome::Command(cmd) => return Progress::Command(cmd),
                    StepOutcome::Advanced => return Progress::Advanced,
                    StepOutcome::Finished => {
                        let op = inner.take(region.id);
                        inner.cooldown.insert(region.id, cooldown);
                        op.map_or(Progress::Idle, Progress::Finished)
                    }
                }
            }
        };
        self.released.notify_waiters();
        progress
    }

    pub fn get(&self, region_id: RegionId) -> Option<Operator> {
        self.inner
            .read()
            .expect("operators lock")
            .operators
            .get(&region_id)
            .cloned()
    }

    /// Every live operator, ordered by region.
    pub fn all(&self) -> Vec<Operator> {
        let mut ops: Vec<_> = self
            .inner
            .read()
            .expect("operators lock")
            .operators
            .values()
            .cloned()
            .collect();
        ops.sort_by_key(|op| op.region_id);
        ops
    }

    pub fn count(&self, kind: ResourceKind) -> u64 {
        self.inner
            .read()
            .expect("operators lock")
            .counts
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    /// A region with a live operator or a live cool-down entry.
    pub fn is_busy(&self, region_id: RegionId) -> bool {
        let inner = self.inner.read().expect("operators lock");
        inner.operators.contains_key(&region_id) || inner.cooldown.contains(region_id)
    }

    pub fn in_cooldown(&self, region_id: RegionId) -> bool {
        self.inner
            .read()
            .expect("operators lock")
            .cooldown
            .contains(region_id)
    }

    pub fn clear_cooldown(&self, region_id: RegionId) -> bool {
        self.inner
            .write()
            .expect("operators lock")
            .cooldown
            .delete(region_id)
    }

    pub fn released(&self) -> &Notify {
        &self.released
    }
}
