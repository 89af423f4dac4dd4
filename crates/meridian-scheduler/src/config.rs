//! Schedule configuration and its atomically swapped holder.
//!
//! `ScheduleConfig` is never mutated in place. Administrators replace it
//! wholesale through [`ScheduleOptions::store`], and every reader works on
//! the `Arc` snapshot it loaded.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ScheduleError, ScheduleResult};
use crate::operator::ResourceKind;

/// Tunables read by controllers, schedulers and the replica checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Max concurrent leader-kind operators.
    pub leader_schedule_limit: u64,
    /// Max concurrent storage-kind operators.
    pub storage_schedule_limit: u64,
    /// Max concurrent storage-kind operators before repair stops proposing.
    pub replica_schedule_limit: u64,
    /// Minimum time between two repairs of the same region.
    #[serde(with = "duration_str")]
    pub replica_schedule_interval: Duration,
    /// Imbalance below this ratio is left alone.
    pub min_balance_diff_ratio: f64,
    /// Replica count every region should have.
    pub max_replicas: usize,
    /// A down replica is removed once it and its store have been down this long.
    #[serde(with = "duration_str")]
    pub max_store_down_time: Duration,
    /// How long a region stays protected after its operator completes.
    #[serde(with = "duration_str")]
    pub region_cooldown: Duration,
    /// Operators older than this are dropped as unreachable.
    #[serde(with = "duration_str")]
    pub max_operator_wait_time: Duration,
    /// Ceiling of a scheduler's adaptive tick interval.
    #[serde(with = "duration_str")]
    pub max_schedule_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            leader_schedule_limit: 4,
            storage_schedule_limit: 4,
            replica_schedule_limit: 8,
            replica_schedule_interval: Duration::from_secs(10),
            min_balance_diff_ratio: 0.1,
            max_replicas: 3,
            max_store_down_time: Duration::from_secs(60 * 60),
            region_cooldown: Duration::from_secs(60),
            max_operator_wait_time: Duration::from_secs(10 * 60),
            max_schedule_interval: Duration::from_secs(60),
        }
    }
}

impl ScheduleConfig {
    /// Concurrency limit for operators of `kind`.
    pub fn schedule_limit(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Leader => self.leader_schedule_limit,
            ResourceKind::Storage => self.storage_schedule_limit,
        }
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        if self.max_replicas == 0 {
            return Err(ScheduleError::InvalidConfig(
                "max_replicas must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_balance_diff_ratio) {
            return Err(ScheduleError::InvalidConfig(format!(
                "min_balance_diff_ratio must be within [0, 1], got {}",
                self.min_balance_diff_ratio
            )));
        }
        if self.max_schedule_interval.is_zero() {
            return Err(ScheduleError::InvalidConfig(
                "max_schedule_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Live options ──────────────────────────────────────────────────

/// Copy-on-write holder of the live [`ScheduleConfig`].
#[derive(Debug)]
pub struct ScheduleOptions {
    current: RwLock<Arc<ScheduleConfig>>,
}

impl ScheduleOptions {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Snapshot of the current configuration.
    pub fn load(&self) -> Arc<ScheduleConfig> {
        self.current.read().expect("options lock").clone()
    }

    /// Validate and atomically replace the configuration.
    pub fn store(&self, config: ScheduleConfig) -> ScheduleResult<()> {
        config.validate()?;
        *self.current.write().expect("options lock") = Arc::new(config);
        info!("schedule config replaced");
        Ok(())
    }
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

// ── Durations ─────────────────────────────────────────────────────

/// Parse a duration string such as `"500ms"`, `"30s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> ScheduleResult<Duration> {
    let s = s.trim();
    let invalid = || ScheduleError::InvalidDuration(s.to_string());

    let (value, unit_ms) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1_000)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60_000)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3_600_000)
    } else {
        return Err(invalid());
    };

    let value: u64 = value.trim().parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

/// Render a duration in the largest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms == 0 {
        "0s".to_string()
    } else if ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

/// Serde adapter for durations written as `"30s"`-style strings.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("xs").is_err());
    }

    #[test]
    fn format_duration_picks_largest_exact_unit() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ScheduleConfig = toml::from_str(
            r#"
leader_schedule_limit = 1
replica_schedule_interval = "500ms"
"#,
        )
        .unwrap();
        assert_eq!(config.leader_schedule_limit, 1);
        assert_eq!(config.replica_schedule_interval, Duration::from_millis(500));
        assert_eq!(config.storage_schedule_limit, 4);
        assert_eq!(config.max_store_down_time, Duration::from_secs(3600));
    }

    #[test]
    fn config_json_uses_duration_strings() {
        let json = serde_json::to_value(ScheduleConfig::default()).unwrap();
        assert_eq!(json["region_cooldown"], "1m");
        assert_eq!(json["max_store_down_time"], "1h");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ScheduleConfig::default();
        assert!(config.validate().is_ok());

        config.min_balance_diff_ratio = 1.5;
        assert!(config.validate().is_err());

        let config = ScheduleConfig {
            max_replicas: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn options_swap_whole_snapshot() {
        let options = ScheduleOptions::default();
        let before = options.load();

        let next = ScheduleConfig {
            leader_schedule_limit: 16,
            ..Default::default()
        };
        options.store(next).unwrap();

        assert_eq!(before.leader_schedule_limit, 4);
        assert_eq!(options.load().leader_schedule_limit, 16);
        assert_eq!(options.load().schedule_limit(ResourceKind::Leader), 16);
    }

    #[test]
    fn options_refuse_invalid_config() {
        let options = ScheduleOptions::default();
        let bad = ScheduleConfig {
            max_schedule_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(options.store(bad).is_err());
        assert_eq!(*options.load(), ScheduleConfig::default());
    }
}
