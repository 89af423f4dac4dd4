//! meridiand.toml configuration.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:2379"
//! store_heartbeat_timeout = "30s"
//!
//! [schedule]
//! leader_schedule_limit = 8
//! region_cooldown = "2m"
//!
//! [[scheduler]]
//! type = "grant-leader"
//! store_id = 4
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use meridian_scheduler::config::duration_str;
use meridian_scheduler::{ScheduleConfig, SchedulerSpec};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
    /// Schedulers started in addition to the leader and storage balancers.
    #[serde(rename = "scheduler")]
    pub schedulers: Vec<SchedulerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// A store silent for longer than this is marked down.
    #[serde(with = "duration_str")]
    pub store_heartbeat_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 2379)),
            store_heartbeat_timeout: Duration::from_secs(30),
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        config.schedule.validate()?;
        Ok(config)
    }
}
