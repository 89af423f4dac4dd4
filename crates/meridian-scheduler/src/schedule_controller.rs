//! A scheduler bound to its kind's controller, with an adaptive tick.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use meridian_cluster::{ClusterInfo, RegionId};

use crate::config::ScheduleConfig;
use crate::controller::Controller;
use crate::operator::{Operator, ResourceKind};
use crate::schedulers::Scheduler;
use crate::stats::{SchedulerCounters, SchedulerStats};

/// Interval right after an admitted proposal, and the starting interval.
pub const MIN_SCHEDULE_INTERVAL: Duration = Duration::from_millis(10);

/// Growth factor applied to the interval after an empty tick.
const SCHEDULE_INTERVAL_FACTOR: f64 = 1.3;

pub struct ScheduleController {
    scheduler: Box<dyn Scheduler>,
    controller: Controller,
    interval: Mutex<Duration>,
    counters: SchedulerCounters,
}

impl ScheduleController {
    pub fn new(scheduler: Box<dyn Scheduler>, controller: Controller) -> Self {
        Self {
            scheduler,
            controller,
            interval: Mutex::new(MIN_SCHEDULE_INTERVAL),
            counters: SchedulerCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.scheduler.name()
    }

    pub fn kind(&self) -> ResourceKind {
        self.scheduler.kind()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Delay before the next tick.
    pub fn interval(&self) -> Duration {
        *self.interval.lock().expect("interval lock")
    }

    /// Run the scheduler once, skipping regions for which `is_busy` holds.
    /// Errors are logged and end the tick empty.
    pub fn schedule(
        &self,
        cluster: &ClusterInfo,
        config: &ScheduleConfig,
        is_busy: &dyn Fn(RegionId) -> bool,
    ) -> Option<Operator> {
        match self.scheduler.schedule(cluster, config, is_busy) {
            Ok(Some(op)) => {
                self.counters.proposed();
                Some(op)
            }
            Ok(None) => {
                self.back_off(config.max_schedule_interval);
                None
            }
            Err(e) => {
                self.counters.failed();
                warn!(scheduler = %self.name(), error = %e, "schedule failed");
                self.back_off(config.max_schedule_interval);
                None
            }
        }
    }

    /// Record whether the last proposal was admitted. An admitted proposal
    /// resets the interval; a rejected one counts as an empty tick.
    pub fn record_admission(&self, admitted: bool, max_interval: Duration) {
        self.counters.admission(admitted);
        if admitted {
            *self.interval.lock().expect("interval lock") = MIN_SCHEDULE_INTERVAL;
        } else {
            self.back_off(max_interval);
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.counters
            .snapshot(self.name(), self.kind(), self.interval().as_millis() as u64)
    }

    fn back_off(&self, max: Duration) {
        let mut interval = self.interval.lock().expect("interval lock");
        let next = interval.mul_f64(SCHEDULE_INTERVAL_FACTOR).min(max);
        if next != *interval {
            debug!(scheduler = %self.name(), interval_ms = next.as_millis() as u64, "schedule interval grown");
        }
        *interval = next;
    }
}
