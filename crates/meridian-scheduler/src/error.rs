//! Scheduling error types.

use thiserror::Error;

use meridian_cluster::{ClusterError, StoreId};

/// Errors that can occur while configuring schedulers or building operators.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule config: {0}")]
    InvalidConfig(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("no replica on store {0}")]
    ReplicaNotFound(StoreId),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
