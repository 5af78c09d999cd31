//! Minimal admin HTTP surface: `/health`, `/stats`, `/shutdown/status`,
//! `/metrics`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::coordinator::Coordinator;
use crate::lifecycle::ShutdownStatus;
use crate::stats::StatsStore;

#[derive(Clone)]
pub struct AdminState {
    pub coordinator: Arc<Coordinator>,
    pub stats: Arc<dyn StatsStore>,
    pub shutdown_status: tokio::sync::watch::Receiver<Option<ShutdownStatus>>,
}

pub fn build_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/shutdown/status", get(shutdown_status))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    username: String,
    minute: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    username: String,
    minute: DateTime<Utc>,
    submission_count: u64,
}

async fn stats(
    State(state): State<AdminState>,
    Query(query): Query<StatsQuery>,
) -> impl IntoResponse {
    match state.stats.get(&query.username, query.minute).await {
        Ok(count) => Json(StatsResponse {
            username: query.username,
            minute: query.minute,
            submission_count: count,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn shutdown_status(State(state): State<AdminState>) -> impl IntoResponse {
    match state.shutdown_status.borrow().clone() {
        Some(status) => Json(status).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

async fn metrics(State(state): State<AdminState>) -> impl IntoResponse {
    let active_sessions = state.coordinator.sessions.len().await as u64;
    state.coordinator.metrics.render_prometheus(active_sessions)
}
