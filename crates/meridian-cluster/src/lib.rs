//! meridian-cluster — in-memory cluster snapshot for the Meridian coordinator.
//!
//! Holds the coordinator's view of every store and region as reported by
//! heartbeats. Schedulers read it, heartbeat ingestion writes it.
//!
//! # Architecture
//!
//! Each store and region is kept behind an `Arc` inside a `RwLock`-protected
//! map. Writers never mutate a published object in place: a heartbeat builds
//! a fresh value and swaps the `Arc`, so a reader always sees one consistent
//! region or store.
//!
//! The `ClusterInfo` is `Send` + `Sync` and is shared across scheduler tasks
//! and heartbeat handlers through an `Arc`.

pub mod cluster;
pub mod error;
pub mod id;
pub mod types;

pub use cluster::ClusterInfo;
pub use error::{ClusterError, ClusterResult};
pub use id::{IdAllocator, MemoryIdAllocator};
pub use types::*;
