//! Store liveness sweep.
//!
//! Stores report through heartbeats only; a store that stops reporting is
//! marked down here so repair can eventually replace its replicas.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use meridian_cluster::ClusterInfo;

/// Sweep for silent stores every `interval` until `shutdown` flips.
pub async fn run_store_monitor(
    cluster: Arc<ClusterInfo>,
    timeout: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(timeout_secs = timeout.as_secs(), "store monitor started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let down = cluster.mark_stale_stores(timeout);
                if !down.is_empty() {
                    debug!(?down, "stale stores marked down");
                }
            }
            _ = shutdown.changed() => {
                info!("store monitor shutting down");
                break;
            }
        }
    }
}
