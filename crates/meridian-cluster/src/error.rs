//! Error types for the cluster snapshot.

use thiserror::Error;

use crate::types::StoreId;

/// Result type alias for cluster snapshot operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur while reading or updating the cluster snapshot.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("store not found: {0}")]
    StoreNotFound(StoreId),

    #[error("id allocation failed: {0}")]
    Allocation(String),
}
