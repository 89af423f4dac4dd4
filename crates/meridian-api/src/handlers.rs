//! REST API handlers.
//!
//! Heartbeats flow into the coordinator; everything else reads or edits
//! its registry, operator table and schedule options.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use meridian_cluster::{RegionId, RegionInfo, StoreId, StoreInfo, StoreStats, epoch_secs};
use meridian_scheduler::{RegionCommand, ScheduleConfig, SchedulerSpec};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Heartbeats ─────────────────────────────────────────────────

/// Reply to a region heartbeat: the command the leader should run next.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegionHeartbeatReply {
    pub command: Option<RegionCommand>,
}

/// Store heartbeat body.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHeartbeat {
    pub store_id: StoreId,
    #[serde(default)]
    pub stats: StoreStats,
}

/// POST /api/v1/heartbeat/region
pub async fn region_heartbeat(
    State(state): State<ApiState>,
    Json(region): Json<RegionInfo>,
) -> impl IntoResponse {
    let region_id = region.id;
    let command = state.coordinator.handle_region_heartbeat(region);
    state.collector.record_region_heartbeat(command.as_ref());
    if let Some(cmd) = &command {
        debug!(region_id, ?cmd, "command dispatched");
    }
    ApiResponse::ok(RegionHeartbeatReply { command })
}

/// POST /api/v1/heartbeat/store
pub async fn store_heartbeat(
    State(state): State<ApiState>,
    Json(hb): Json<StoreHeartbeat>,
) -> impl IntoResponse {
    let store = state
        .coordinator
        .cluster()
        .put_store_stats(hb.store_id, hb.stats);
    state.collector.record_store_heartbeat(hb.store_id);
    ApiResponse::ok(StoreInfo::clone(&store))
}

// ── Cluster ────────────────────────────────────────────────────

/// GET /api/v1/stores
pub async fn list_stores(State(state): State<ApiState>) -> impl IntoResponse {
    let stores: Vec<StoreInfo> = state
        .coordinator
        .cluster()
        .stores()
        .iter()
        .map(|s| StoreInfo::clone(s))
        .collect();
    ApiResponse::ok(stores)
}

/// POST /api/v1/stores/:id/down
pub async fn mark_store_down(
    State(state): State<ApiState>,
    Path(id): Path<StoreId>,
) -> impl IntoResponse {
    match state.coordinator.cluster().set_store_down(id, epoch_secs()) {
        Ok(()) => {
            info!(store_id = id, "store marked down");
            ApiResponse::ok("down").into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response(),
    }
}

/// GET /api/v1/regions/:id
pub async fn get_region(
    State(state): State<ApiState>,
    Path(id): Path<RegionId>,
) -> impl IntoResponse {
    match state.coordinator.cluster().get_region(id) {
        Some(region) => ApiResponse::ok(RegionInfo::clone(&region)).into_response(),
        None => error_response("region not found", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Operators ──────────────────────────────────────────────────

/// GET /api/v1/operators
pub async fn list_operators(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.coordinator.operators())
}

/// GET /api/v1/operators/:region_id
pub async fn get_operator(
    State(state): State<ApiState>,
    Path(region_id): Path<RegionId>,
) -> impl IntoResponse {
    match state.coordinator.get_operator(region_id) {
        Some(op) => ApiResponse::ok(op).into_response(),
        None => error_response("operator not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// DELETE /api/v1/operators/:region_id
pub async fn remove_operator(
    State(state): State<ApiState>,
    Path(region_id): Path<RegionId>,
) -> impl IntoResponse {
    match state.coordinator.remove_operator(region_id) {
        Some(op) => ApiResponse::ok(op).into_response(),
        None => error_response("operator not found", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Schedulers ─────────────────────────────────────────────────

/// GET /api/v1/schedulers
pub async fn list_schedulers(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.coordinator.scheduler_stats())
}

/// POST /api/v1/schedulers
pub async fn add_scheduler(
    State(state): State<ApiState>,
    Json(spec): Json<SchedulerSpec>,
) -> impl IntoResponse {
    let scheduler = spec.build();
    let name = scheduler.name().to_string();
    if state.coordinator.add_scheduler(scheduler) {
        (StatusCode::CREATED, ApiResponse::ok(name)).into_response()
    } else {
        error_response(
            &format!("scheduler {name} already running or coordinator stopped"),
            StatusCode::CONFLICT,
        )
        .into_response()
    }
}

/// DELETE /api/v1/schedulers/:name
pub async fn remove_scheduler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    if state.coordinator.remove_scheduler(&name).await {
        ApiResponse::ok(name).into_response()
    } else {
        error_response("scheduler not found", StatusCode::NOT_FOUND).into_response()
    }
}

// ── Config ─────────────────────────────────────────────────────

/// GET /api/v1/config
pub async fn get_config(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(ScheduleConfig::clone(&state.coordinator.options().load()))
}

/// PUT /api/v1/config
pub async fn put_config(
    State(state): State<ApiState>,
    Json(config): Json<ScheduleConfig>,
) -> impl IntoResponse {
    match state.coordinator.options().store(config.clone()) {
        Ok(()) => ApiResponse::ok(config).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

// ── Metrics ────────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = meridian_metrics::render_prometheus(
        &state.coordinator.snapshot(),
        &state.collector.snapshot(),
    );
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use meridian_cluster::{ClusterInfo, MemoryIdAllocator, Replica};
    use meridian_scheduler::{
        Coordinator, Operator, OperatorStep, ResourceKind, ScheduleOptions,
    };

    fn test_state() -> ApiState {
        let cluster = Arc::new(ClusterInfo::new(Arc::new(MemoryIdAllocator::default())));
        let options = Arc::new(ScheduleOptions::default());
        ApiState::new(Arc::new(Coordinator::new(cluster, options)))
    }

    fn leader_region(region_id: RegionId, leader_store: StoreId) -> RegionInfo {
        let replicas: Vec<_> = [1, 2, 3]
            .iter()
            .map(|&s| Replica::new(region_id * 100 + s, s))
            .collect();
        let leader = replicas.iter().copied().find(|r| r.store_id == leader_store);
        RegionInfo::new(region_id, replicas, leader)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn region_heartbeat_without_operator_returns_no_command() {
        let state = test_state();
        let resp = region_heartbeat(State(state.clone()), Json(leader_region(1, 1)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert!(body["data"]["command"].is_null());
        assert_eq!(state.collector.snapshot().region_heartbeats, 1);
        assert!(state.coordinator.cluster().get_region(1).is_some());
    }

    #[tokio::test]
    async fn region_heartbeat_dispatches_operator_step() {
        let state = test_state();
        let op = Operator::new(
            1,
            ResourceKind::Leader,
            vec![OperatorStep::TransferLeader {
                replica: Replica::new(102, 2),
            }],
        );
        assert!(state.coordinator.add_operator(op));

        let resp = region_heartbeat(State(state.clone()), Json(leader_region(1, 1)))
            .await
            .into_response();
        let body = body_json(resp).await;
        assert_eq!(body["data"]["command"]["type"], "transfer_leader");
        assert_eq!(state.collector.snapshot().transfer_leader, 1);
    }

    #[tokio::test]
    async fn store_heartbeat_registers_store() {
        let state = test_state();
        let hb = StoreHeartbeat {
            store_id: 7,
            stats: StoreStats {
                leader_count: 3,
                region_count: 5,
                used_ratio: 0.4,
            },
        };
        let resp = store_heartbeat(State(state.clone()), Json(hb))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let store = state.coordinator.cluster().get_store(7).unwrap();
        assert_eq!(store.stats.leader_count, 3);
        assert_eq!(state.collector.snapshot().store_heartbeats, vec![(7, 1)]);
    }

    #[tokio::test]
    async fn mark_unknown_store_down_is_404() {
        let state = test_state();
        let resp = mark_store_down(State(state), Path(9)).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mark_store_down_updates_state() {
        let state = test_state();
        state
            .coordinator
            .cluster()
            .put_store_stats(1, StoreStats::default());
        let resp = mark_store_down(State(state.clone()), Path(1))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!state.coordinator.cluster().get_store(1).unwrap().is_up());
    }

    #[tokio::test]
    async fn get_missing_region_is_404() {
        let resp = get_region(State(test_state()), Path(3)).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn operator_get_and_delete() {
        let state = test_state();
        let resp = get_operator(State(state.clone()), Path(1))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let op = Operator::new(
            1,
            ResourceKind::Leader,
            vec![OperatorStep::TransferLeader {
                replica: Replica::new(102, 2),
            }],
        );
        state.coordinator.add_operator(op);

        let resp = list_operators(State(state.clone())).await.into_response();
        let body = body_json(resp).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let resp = get_operator(State(state.clone()), Path(1))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = remove_operator(State(state.clone()), Path(1))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!state.coordinator.in_cooldown(1));

        let resp = remove_operator(State(state), Path(1)).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scheduler_add_conflict_and_remove() {
        let state = test_state();
        let spec = SchedulerSpec::GrantLeader { store_id: 4 };

        let resp = add_scheduler(State(state.clone()), Json(spec.clone()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = add_scheduler(State(state.clone()), Json(spec))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = list_schedulers(State(state.clone())).await.into_response();
        let body = body_json(resp).await;
        assert_eq!(body["data"][0]["name"], "grant-leader-4");

        let resp = remove_scheduler(State(state.clone()), Path("grant-leader-4".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = remove_scheduler(State(state.clone()), Path("grant-leader-4".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        state.coordinator.stop().await;
    }

    #[tokio::test]
    async fn add_scheduler_after_stop_conflicts() {
        let state = test_state();
        state.coordinator.stop().await;
        let resp = add_scheduler(State(state), Json(SchedulerSpec::LeaderBalance))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn config_put_validates() {
        let state = test_state();
        let config = ScheduleConfig {
            leader_schedule_limit: 9,
            ..Default::default()
        };
        let resp = put_config(State(state.clone()), Json(config))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.coordinator.options().load().leader_schedule_limit, 9);

        let bad = ScheduleConfig {
            max_replicas: 0,
            ..Default::default()
        };
        let resp = put_config(State(state.clone()), Json(bad))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.coordinator.options().load().leader_schedule_limit, 9);

        let resp = get_config(State(state)).await.into_response();
        let body = body_json(resp).await;
        assert_eq!(body["data"]["leader_schedule_limit"], 9);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_text() {
        let state = test_state();
        state.collector.record_region_heartbeat(None);
        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("meridian_region_heartbeats_total 1"));
    }
}
