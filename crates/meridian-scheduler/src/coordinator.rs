//! Coordinator — scheduler registry, operator admission and heartbeat dispatch.
//!
//! The `Coordinator` owns:
//! - the registry of schedulers, each ticking in its own task
//! - the live operator table (per-kind counts and the cool-down cache)
//! - the replica checker that repairs regions inline on dispatch
//!
//! Every heartbeat goes through [`Coordinator::dispatch`], which advances the
//! region's operator by at most one step and returns the command the store
//! should execute next, if any.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use meridian_cluster::{ClusterInfo, RegionId, RegionInfo};

use crate::config::{ScheduleConfig, ScheduleOptions};
use crate::controller::{Admission, Controller};
use crate::operator::{Operator, RegionCommand, ResourceKind};
use crate::replica_checker::ReplicaChecker;
use crate::schedule_controller::ScheduleController;
use crate::schedulers::{BalanceLeaderScheduler, BalanceStorageScheduler, Scheduler};
use crate::stats::SchedulerStats;
use crate::table::{OperatorTable, Progress, Rejection};

/// Per-scheduler state held in the registry.
struct SchedulerSlot {
    controller: Arc<ScheduleController>,
    /// Handle to the ticking task.
    handle: JoinHandle<()>,
}

/// Point-in-time view used by the admin API and metrics.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    pub leader_operators: u64,
    pub storage_operators: u64,
    pub stores_up: usize,
    pub stores_down: usize,
    pub regions: usize,
    pub schedulers: Vec<SchedulerStats>,
}

pub struct Coordinator {
    cluster: Arc<ClusterInfo>,
    options: Arc<ScheduleOptions>,
    table: Arc<OperatorTable>,
    checker: ReplicaChecker,
    /// Active schedulers: name → slot.
    schedulers: Mutex<HashMap<String, SchedulerSlot>>,
    /// Root cancellation signal; every controller context derives from it.
    shutdown_tx: watch::Sender<bool>,
}

impl Coordinator {
    pub fn new(cluster: Arc<ClusterInfo>, options: Arc<ScheduleOptions>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            cluster,
            options,
            table: Arc::new(OperatorTable::new()),
            checker: ReplicaChecker::new(),
            schedulers: Mutex::new(HashMap::new()),
            shutdown_tx,
        }
    }

    pub fn cluster(&self) -> &Arc<ClusterInfo> {
        &self.cluster
    }

    pub fn options(&self) -> &Arc<ScheduleOptions> {
        &self.options
    }

    /// Register the default balancers.
    pub fn run(&self) {
        self.add_scheduler(Box::new(BalanceLeaderScheduler::new()));
        self.add_scheduler(Box::new(BalanceStorageScheduler::new()));
        info!("coordinator running");
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// A controller for `kind`, cancelled when the coordinator stops.
    pub fn new_controller(&self, kind: ResourceKind) -> Controller {
        Controller::new(
            kind,
            self.table.clone(),
            self.options.clone(),
            self.shutdown_tx.subscribe(),
        )
    }

    // ── Scheduler registry ─────────────────────────────────────────

    /// Register a scheduler and start its task. Returns false if the name is
    /// taken or the coordinator has stopped.
    pub fn add_scheduler(&self, scheduler: Box<dyn Scheduler>) -> bool {
        let mut schedulers = self.schedulers.lock().expect("schedulers lock");
        let name = scheduler.name().to_string();
        if self.is_stopped() {
            warn!(scheduler = %name, "coordinator stopped, scheduler not added");
            return false;
        }
        if schedulers.contains_key(&name) {
            warn!(scheduler = %name, "scheduler already registered");
            return false;
        }

        let controller = self.new_controller(scheduler.kind());
        let sc = Arc::new(ScheduleController::new(scheduler, controller));
        let handle = tokio::spawn(run_scheduler(
            sc.clone(),
            self.cluster.clone(),
            self.table.clone(),
            self.options.clone(),
        ));
        schedulers.insert(
            name.clone(),
            SchedulerSlot {
                controller: sc,
                handle,
            },
        );
        info!(scheduler = %name, "scheduler added");
        true
    }

    /// Stop and unregister a scheduler, waiting for its task to exit.
    /// Returns false if the name is unknown.
    pub async fn remove_scheduler(&self, name: &str) -> bool {
        let slot = self.schedulers.lock().expect("schedulers lock").remove(name);
        let Some(slot) = slot else {
            debug!(scheduler = %name, "scheduler not registered, nothing to remove");
            return false;
        };
        slot.controller.controller().stop();
        if let Err(e) = slot.handle.await {
            warn!(scheduler = %name, error = %e, "scheduler task ended abnormally");
        }
        info!(scheduler = %name, "scheduler removed");
        true
    }

    /// Registered scheduler names, sorted.
    pub fn scheduler_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .schedulers
            .lock()
            .expect("schedulers lock")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn scheduler_stats(&self) -> Vec<SchedulerStats> {
        let mut stats: Vec<_> = self
            .schedulers
            .lock()
            .expect("schedulers lock")
            .values()
            .map(|slot| slot.controller.stats())
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    // ── Operators ──────────────────────────────────────────────────

    /// Admit an operator unless its region is busy or cooling down, or its
    /// kind is at the configured limit.
    pub fn add_operator(&self, op: Operator) -> bool {
        let limit = self.options.load().schedule_limit(op.kind);
        admit(&self.table, op, limit, "admin")
    }

    /// Drop a region's operator without cool-down.
    pub fn remove_operator(&self, region_id: RegionId) -> Option<Operator> {
        let op = self.table.remove(region_id);
        if let Some(op) = &op {
            info!(region_id, kind = %op.kind, "operator removed");
        }
        op
    }

    pub fn get_operator(&self, region_id: RegionId) -> Option<Operator> {
        self.table.get(region_id)
    }

    pub fn get_operator_count(&self, kind: ResourceKind) -> u64 {
        self.table.count(kind)
    }

    pub fn operators(&self) -> Vec<Operator> {
        self.table.all()
    }

    pub fn in_cooldown(&self, region_id: RegionId) -> bool {
        self.table.in_cooldown(region_id)
    }

    /// Lift a region's cool-down early.
    pub fn clear_cooldown(&self, region_id: RegionId) -> bool {
        self.table.clear_cooldown(region_id)
    }

    // ── Heartbeats ─────────────────────────────────────────────────

    /// Store a reported region and dispatch on it. An epoch version change
    /// (split or merge) invalidates the live operator first.
    pub fn handle_region_heartbeat(&self, region: RegionInfo) -> Option<RegionCommand> {
        let previous = self.cluster.put_region(region.clone());
        if let Some(previous) = previous
            && previous.epoch.version != region.epoch.version
            && self.remove_operator(region.id).is_some()
        {
            info!(
                region_id = region.id,
                from = previous.epoch.version,
                to = region.epoch.version,
                "operator invalidated by region epoch change"
            );
        }
        self.dispatch(&region)
    }

    /// Advance the region's operator by one step, or repair the region if it
    /// has none, and return the command to send back.
    pub fn dispatch(&self, region: &RegionInfo) -> Option<RegionCommand> {
        let config = self.options.load();
        match self.step(region, &config) {
            Progress::Command(cmd) => {
                debug!(region_id = region.id, ?cmd, "dispatching operator step");
                Some(cmd)
            }
            Progress::Advanced => {
                debug!(region_id = region.id, "operator step finished");
                None
            }
            Progress::Finished(op) => {
                info!(region_id = region.id, kind = %op.kind, steps = op.steps().len(), "operator finished");
                None
            }
            Progress::Expired(op) => {
                warn!(
                    region_id = region.id,
                    kind = %op.kind,
                    age_secs = op.age().as_secs(),
                    "operator timed out"
                );
                None
            }
            Progress::Idle => self.check_replicas(region, &config),
        }
    }

    fn step(&self, region: &RegionInfo, config: &ScheduleConfig) -> Progress {
        self.table
            .step(region, config.region_cooldown, config.max_operator_wait_time)
    }

    fn check_replicas(&self, region: &RegionInfo, config: &ScheduleConfig) -> Option<RegionCommand> {
        if self.table.is_busy(region.id)
            || self.table.count(ResourceKind::Storage) >= config.replica_schedule_limit
        {
            return None;
        }
        let op = match self.checker.check(&self.cluster, config, region) {
            Ok(Some(op)) => op,
            Ok(None) => return None,
            Err(e) => {
                warn!(region_id = region.id, error = %e, "replica check failed");
                return None;
            }
        };
        if !admit(&self.table, op, config.replica_schedule_limit, "replica-checker") {
            return None;
        }
        self.checker
            .record(region.id, config.replica_schedule_interval);

        match self.step(region, config) {
            Progress::Command(cmd) => Some(cmd),
            _ => None,
        }
    }

    // ── Observability & shutdown ───────────────────────────────────

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let stores = self.cluster.stores();
        let stores_up = stores.iter().filter(|s| s.is_up()).count();
        CoordinatorSnapshot {
            leader_operators: self.get_operator_count(ResourceKind::Leader),
            storage_operators: self.get_operator_count(ResourceKind::Storage),
            stores_up,
            stores_down: stores.len() - stores_up,
            regions: self.cluster.region_count(),
            schedulers: self.scheduler_stats(),
        }
    }

    /// Cancel every scheduler and wait for all tasks to exit. Safe to call
    /// more than once.
    pub async fn stop(&self) {
        let first = !self.shutdown_tx.send_replace(true);
        let slots: Vec<(String, SchedulerSlot)> =
            self.schedulers.lock().expect("schedulers lock").drain().collect();

        for (_, slot) in &slots {
            slot.controller.controller().stop();
        }
        for (name, slot) in slots {
            if let Err(e) = slot.handle.await {
                warn!(scheduler = %name, error = %e, "scheduler task ended abnormally");
            }
        }
        if first {
            info!("coordinator stopped");
        }
    }
}

/// Try to record `op`; rejections are logged, never errors.
fn admit(table: &OperatorTable, op: Operator, limit: u64, source: &str) -> bool {
    let region_id = op.region_id;
    let kind = op.kind;
    match table.admit(op, limit) {
        Ok(()) => {
            info!(region_id, %kind, source, "operator admitted");
            true
        }
        Err(reason) => {
            let reason = match reason {
                Rejection::RegionBusy => "region busy",
                Rejection::CoolingDown => "region cooling down",
                Rejection::LimitReached => "limit reached",
            };
            debug!(region_id, %kind, source, reason, "operator rejected");
            false
        }
    }
}

/// The ticking loop of one scheduler.
async fn run_scheduler(
    sc: Arc<ScheduleController>,
    cluster: Arc<ClusterInfo>,
    table: Arc<OperatorTable>,
    options: Arc<ScheduleOptions>,
) {
    let mut ctx = sc.controller().context();
    info!(scheduler = %sc.name(), kind = %sc.kind(), "scheduler started");

    loop {
        let interval = sc.interval();

        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if !sc.controller().allow_schedule()
                    && sc.controller().wait_allowed().await == Admission::Cancelled
                {
                    break;
                }
                let config = options.load();
                let is_busy = |region_id: RegionId| table.is_busy(region_id);
                if let Some(op) = sc.schedule(&cluster, &config, &is_busy) {
                    let limit = config.schedule_limit(op.kind);
                    let admitted = admit(&table, op, limit, sc.name());
                    sc.record_admission(admitted, config.max_schedule_interval);
                }
            }
            _ = ctx.done() => break,
        }
    }

    info!(scheduler = %sc.name(), "scheduler stopped");
}
