//! Per-kind concurrency controller.
//!
//! A [`Controller`] answers "may another operator of this kind start?" from
//! the live operator count and the current config, and carries a
//! cancellable context that the coordinator trips on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::config::ScheduleOptions;
use crate::operator::ResourceKind;
use crate::table::OperatorTable;

/// Fallback re-check period while waiting for capacity. Limit increases
/// are not signalled, so waiters poll at this rate in addition to being
/// woken when an operator leaves the table.
const RECHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of [`Controller::wait_allowed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Cancelled,
}

/// Cancellation handle derived from the coordinator's shutdown signal and
/// the controller's own stop signal. Done when either fires.
#[derive(Debug, Clone)]
pub struct ControllerContext {
    parent: watch::Receiver<bool>,
    own: watch::Receiver<bool>,
}

impl ControllerContext {
    pub fn is_done(&self) -> bool {
        *self.parent.borrow() || *self.own.borrow()
    }

    /// Resolve once the context is cancelled. A dropped sender counts as
    /// cancellation.
    pub async fn done(&mut self) {
        tokio::select! {
            _ = self.parent.wait_for(|stopped| *stopped) => {}
            _ = self.own.wait_for(|stopped| *stopped) => {}
        }
    }
}

/// Admission control for one resource kind.
pub struct Controller {
    kind: ResourceKind,
    table: Arc<OperatorTable>,
    options: Arc<ScheduleOptions>,
    stop_tx: watch::Sender<bool>,
    ctx: ControllerContext,
}

impl Controller {
    pub(crate) fn new(
        kind: ResourceKind,
        table: Arc<OperatorTable>,
        options: Arc<ScheduleOptions>,
        parent: watch::Receiver<bool>,
    ) -> Self {
        let (stop_tx, own) = watch::channel(false);
        Self {
            kind,
            table,
            options,
            stop_tx,
            ctx: ControllerContext { parent, own },
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Current limit for this kind, read from the live config.
    pub fn limit(&self) -> u64 {
        self.options.load().schedule_limit(self.kind)
    }

    pub fn operator_count(&self) -> u64 {
        self.table.count(self.kind)
    }

    /// True iff fewer than `limit` operators of this kind are live.
    pub fn allow_schedule(&self) -> bool {
        self.operator_count() < self.limit()
    }

    pub fn context(&self) -> ControllerContext {
        self.ctx.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.ctx.is_done()
    }

    /// Cancel this controller's context. Safe to call more than once.
    pub fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            debug!(kind = %self.kind, "controller stopped");
        }
    }

    /// Block until scheduling is allowed or the context is cancelled.
    /// Cancellation always wins over a concurrent release.
    pub async fn wait_allowed(&self) -> Admission {
        let mut ctx = self.ctx.clone();
        loop {
            if ctx.is_done() {
                return Admission::Cancelled;
            }

            let released = self.table.released().notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if self.allow_schedule() {
                return Admission::Allowed;
            }

            tokio::select! {
                _ = ctx.done() => return Admission::Cancelled,
                _ = &mut released => {}
                _ = tokio::time::sleep(RECHECK_INTERVAL) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use crate::operator::Operator;

    fn controller(limit: u64) -> (Controller, Arc<OperatorTable>, watch::Sender<bool>) {
        let table = Arc::new(OperatorTable::new());
        let options = Arc::new(ScheduleOptions::new(ScheduleConfig {
            leader_schedule_limit: limit,
            ..Default::default()
        }));
        let (root_tx, root_rx) = watch::channel(false);
        let controller = Controller::new(ResourceKind::Leader, table.clone(), options, root_rx);
        (controller, table, root_tx)
    }

    #[test]
    fn allow_tracks_count_against_limit() {
        let (controller, table, _root) = controller(1);
        assert!(controller.allow_schedule());

        table
            .admit(Operator::new(1, ResourceKind::Leader, vec![]), 1)
            .unwrap();
        assert!(!controller.allow_schedule());

        // A storage operator does not count against the leader limit.
        table
            .admit(Operator::new(2, ResourceKind::Storage, vec![]), 4)
            .unwrap();
        assert_eq!(controller.operator_count(), 1);
    }

    #[test]
    fn limit_change_applies_on_next_check() {
        let (controller, table, _root) = controller(1);
        table
            .admit(Operator::new(1, ResourceKind::Leader, vec![]), 1)
            .unwrap();
        assert!(!controller.allow_schedule());

        controller
            .options
            .store(ScheduleConfig {
                leader_schedule_limit: 2,
                ..Default::default()
            })
            .unwrap();
        assert!(controller.allow_schedule());

        controller
            .options
            .store(ScheduleConfig {
                leader_schedule_limit: 0,
                ..Default::default()
            })
            .unwrap();
        assert!(!controller.allow_schedule());
        assert_eq!(table.count(ResourceKind::Leader), 1);
    }

    #[tokio::test]
    async fn stop_cancels_waiter() {
        let (controller, table, _root) = controller(1);
        table
            .admit(Operator::new(1, ResourceKind::Leader, vec![]), 1)
            .unwrap();

        let controller = Arc::new(controller);
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_allowed().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.stop();
        controller.stop();

        assert_eq!(waiter.await.unwrap(), Admission::Cancelled);
        assert!(controller.is_stopped());
    }

    #[tokio::test]
    async fn parent_shutdown_cancels_context() {
        let (controller, _table, root) = controller(1);
        let mut ctx = controller.context();
        assert!(!ctx.is_done());

        root.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), ctx.done())
            .await
            .unwrap();
        assert!(controller.is_stopped());
        assert_eq!(controller.wait_allowed().await, Admission::Cancelled);
    }

    #[tokio::test]
    async fn release_wakes_waiter() {
        let (controller, table, _root) = controller(1);
        table
            .admit(Operator::new(1, ResourceKind::Leader, vec![]), 1)
            .unwrap();

        let controller = Arc::new(controller);
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_allowed().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        table.remove(1);

        let admission = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admission, Admission::Allowed);
    }
}
