//! meridian-metrics — observability for the Meridian coordinator.
//!
//! Counts heartbeats and the commands dispatched in response, and renders
//! coordinator state in the Prometheus text exposition format.
//!
//! # Architecture
//!
//! ```text
//! DispatchCollector
//!   ├── record_region_heartbeat() ← called per region heartbeat
//!   ├── record_store_heartbeat()  ← called per store heartbeat
//!   └── snapshot() → DispatchSnapshot
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::{DispatchCollector, DispatchSnapshot};
pub use prometheus::render_prometheus;
