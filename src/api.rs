use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::activity_log::LogEntry;
use crate::notify::Notification;
use crate::selector::SelectorService;
use crate::sources::Source;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SelectorService>,
}

/// Read-mostly surface for the dashboard plus one admin trigger.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/status", get(status))
        .route("/api/sources", get(sources))
        .route("/api/notifications", get(notifications))
        .route("/api/notifications/read", post(mark_notifications_read))
        .route("/api/logs", get(logs))
        .route("/api/reconcile", post(trigger_reconcile))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct StatusResp {
    active_source_id: Option<String>,
    active_source_name: Option<String>,
    last_value: Option<f64>,
    rolling_average: f64,
    rolling_count: usize,
    last_full_check_at: Option<u64>,
    unread_notifications: usize,
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    let snap = state.service.snapshot().await;
    let active_source_name = snap.active_source_id.as_ref().and_then(|id| {
        snap.sources
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.name.clone())
    });
    let (rolling_average, rolling_count) = state.service.rolling.average_and_count();

    Json(StatusResp {
        active_source_id: snap.active_source_id,
        active_source_name,
        last_value: snap.last_value,
        rolling_average,
        rolling_count,
        last_full_check_at: snap.last_full_check_at,
        unread_notifications: state.service.notifications.unread_count(),
    })
}

async fn sources(State(state): State<AppState>) -> Json<Vec<Source>> {
    Json(state.service.snapshot().await.sources)
}

async fn notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.service.notifications.snapshot())
}

#[derive(serde::Serialize)]
struct MarkReadResp {
    marked: usize,
}

async fn mark_notifications_read(State(state): State<AppState>) -> Json<MarkReadResp> {
    let marked = state.service.notifications.unread_count();
    state.service.notifications.mark_all_read();
    Json(MarkReadResp { marked })
}

async fn logs(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<LogEntry>> {
    let n = params
        .get("n")
        .and_then(|v| v.parse().ok())
        .unwrap_or(crate::activity_log::LOG_CAP);
    Json(state.service.logs.snapshot_last_n(n))
}

#[derive(serde::Serialize)]
struct ReconcileResp {
    active_source_id: Option<String>,
}

async fn trigger_reconcile(State(state): State<AppState>) -> Json<ReconcileResp> {
    state.service.reconcile_all().await;
    Json(ReconcileResp {
        active_source_id: state.service.active_source_id().await,
    })
}
