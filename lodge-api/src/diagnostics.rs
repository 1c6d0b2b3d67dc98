//! Developer-only routes, compiled with the `diagnostics` feature.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lodge_notify::{CacheSnapshot, Diagnostics};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/debug/sessions/{session_id}/cache", get(inspect_cache).delete(clear_cache))
        .route("/v1/debug/demand", post(simulate_demand))
        .route("/v1/debug/presence/load", post(simulate_presence))
}

fn diagnostics(state: &AppState) -> Diagnostics {
    Diagnostics::new(
        state.caches.clone(),
        Arc::new(state.hub().clone()),
        Arc::new(state.backend.clone()),
        state.bus.clone(),
    )
}

async fn inspect_cache(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CacheSnapshot>, AppError> {
    Ok(Json(diagnostics(&state).inspect_cache(&session_id).await?))
}

async fn clear_cache(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    diagnostics(&state).clear_cache(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateDemandRequest {
    pub event_id: String,
    pub ticket_definition_id: String,
}

async fn simulate_demand(
    State(state): State<AppState>,
    Json(req): Json<SimulateDemandRequest>,
) -> StatusCode {
    diagnostics(&state).simulate_high_demand(&req.event_id, &req.ticket_definition_id);
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatePresenceRequest {
    pub event_id: String,
    pub viewers: usize,
    #[serde(default)]
    pub reserving: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatePresenceResponse {
    pub event_id: String,
    pub synthetic_viewers: usize,
}

/// Replaces any earlier synthetic load for the event; `viewers: 0` removes it.
async fn simulate_presence(
    State(state): State<AppState>,
    Json(req): Json<SimulatePresenceRequest>,
) -> Result<Json<SimulatePresenceResponse>, AppError> {
    if req.reserving > req.viewers {
        return Err(AppError::ValidationError("reserving cannot exceed viewers".to_string()));
    }

    let mut loads = state.synthetic_load.lock().await;
    loads.remove(&req.event_id);
    if req.viewers > 0 {
        let load = diagnostics(&state)
            .simulate_viewers(&req.event_id, req.viewers, req.reserving)
            .await?;
        loads.insert(req.event_id.clone(), load);
    }

    Ok(Json(SimulatePresenceResponse {
        event_id: req.event_id,
        synthetic_viewers: req.viewers,
    }))
}
