//! HTTP notification endpoint and report routes

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use burnscope_common::prelude::*;
use tracing::{debug, info, warn};

use crate::cache::ReportCache;

/// Something that can recompute all windows on request
#[async_trait]
pub trait RecomputeTrigger: Send + Sync + 'static {
    /// Start a run unless one is already in progress
    async fn request_run(&self) -> TriggerOutcome;
}

#[derive(Clone)]
struct TriggerState {
    trigger: Arc<dyn RecomputeTrigger>,
    cache: ReportCache,
}

pub fn router(trigger: Arc<dyn RecomputeTrigger>, cache: ReportCache) -> Router {
    Router::new()
        .route("/new_block", post(new_block))
        .route("/reports/{window}", get(report_for_window))
        .with_state(TriggerState { trigger, cache })
}

/// Serve the router until the listener fails
pub async fn serve_trigger(addr: SocketAddr, router: Router) -> ScopeResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ScopeError::network(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Block observer listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| ScopeError::network(format!("Observer server failed: {}", e)))
}

async fn new_block(
    State(state): State<TriggerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if !addr.ip().is_loopback() {
        warn!(%addr, "Rejected block notification from non-local peer");
        return (StatusCode::FORBIDDEN, "notifications are accepted from localhost only")
            .into_response();
    }

    match state.trigger.request_run().await {
        TriggerOutcome::Completed => StatusCode::OK.into_response(),
        TriggerOutcome::Failed(message) => {
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
        TriggerOutcome::Busy => {
            debug!("Run already in progress, notification dropped");
            (StatusCode::TOO_MANY_REQUESTS, "a run is already in progress").into_response()
        }
    }
}

async fn report_for_window(
    State(state): State<TriggerState>,
    Path(window): Path<u64>,
) -> Response {
    match state.cache.get(window) {
        Some(report) => Json(report).into_response(),
        None => (StatusCode::NOT_FOUND, format!("no report for window {}", window)).into_response(),
    }
}
