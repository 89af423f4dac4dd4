//! meridian-api — REST API for the Meridian coordinator.
//!
//! Carries heartbeats into the coordinator and exposes the scheduler
//! registry, live operators and the schedule configuration.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/heartbeat/region` | Ingest a region, return the command to run |
//! | POST | `/api/v1/heartbeat/store` | Ingest store stats |
//! | GET | `/api/v1/stores` | List stores |
//! | POST | `/api/v1/stores/{id}/down` | Mark a store down |
//! | GET | `/api/v1/regions/{id}` | Get a region |
//! | GET | `/api/v1/operators` | List live operators |
//! | GET | `/api/v1/operators/{region_id}` | Get a region's operator |
//! | DELETE | `/api/v1/operators/{region_id}` | Drop a region's operator |
//! | GET | `/api/v1/schedulers` | List schedulers with counters |
//! | POST | `/api/v1/schedulers` | Add a scheduler |
//! | DELETE | `/api/v1/schedulers/{name}` | Remove a scheduler |
//! | GET | `/api/v1/config` | Get the schedule config |
//! | PUT | `/api/v1/config` | Replace the schedule config |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use meridian_metrics::DispatchCollector;
use meridian_scheduler::Coordinator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
    pub collector: Arc<DispatchCollector>,
}

impl ApiState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            collector: Arc::new(DispatchCollector::new()),
        }
    }
}

/// Build the complete API router (REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/heartbeat/region", post(handlers::region_heartbeat))
        .route("/heartbeat/store", post(handlers::store_heartbeat))
        .route("/stores", get(handlers::list_stores))
        .route("/stores/{id}/down", post(handlers::mark_store_down))
        .route("/regions/{id}", get(handlers::get_region))
        .route("/operators", get(handlers::list_operators))
        .route(
            "/operators/{region_id}",
            get(handlers::get_operator).delete(handlers::remove_operator),
        )
        .route(
            "/schedulers",
            get(handlers::list_schedulers).post(handlers::add_scheduler),
        )
        .route("/schedulers/{name}", axum::routing::delete(handlers::remove_scheduler))
        .route("/config", get(handlers::get_config).put(handlers::put_config))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
