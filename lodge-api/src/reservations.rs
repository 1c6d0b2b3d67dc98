use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use lodge_core::reservation::{load_reservation, store_reservation};
use lodge_core::{Clock, MonotonicClock};
use lodge_notify::{CountdownTick, ReservationCountdown};
use lodge_shared::ReservationRecord;
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;
use crate::sse::{json_event, watch_events, Emit, EventStream};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/sessions/{session_id}/reservation",
            put(put_reservation).get(get_reservation),
        )
        .route("/v1/sessions/{session_id}/countdown/stream", get(stream_countdown))
}

/// PUT /v1/sessions/{session_id}/reservation
/// Caches the session's latest reservation, replacing any earlier one.
async fn put_reservation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(record): Json<ReservationRecord>,
) -> Result<StatusCode, AppError> {
    let cache = state.caches.session(&session_id);
    store_reservation(cache.as_ref(), &record).await?;
    info!("Cached reservation {} for session {}", record.reservation_id, session_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/sessions/{session_id}/reservation
async fn get_reservation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReservationRecord>, AppError> {
    let cache = state.caches.session(&session_id);
    load_reservation(cache.as_ref())
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFoundError(format!("No reservation for session {}", session_id))
        })
}

/// GET /v1/sessions/{session_id}/countdown/stream
/// Ticks until the reservation is visually expired, then closes. Expiry is
/// display-only; the cached reservation is left as is.
async fn stream_countdown(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<EventStream, AppError> {
    let cache = state.caches.session(&session_id);
    let record = ReservationCountdown::resolve(None, cache.as_ref())
        .await?
        .ok_or_else(|| {
            AppError::NotFoundError(format!("No reservation for session {}", session_id))
        })?;

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let countdown = ReservationCountdown::start(record, clock, state.countdown_settings());
    let rx = countdown.watch();

    Ok(watch_events(rx, countdown, |tick: &CountdownTick| {
        match json_event("countdown", tick) {
            Some(event) if tick.state.is_expired() => Emit::Last(event),
            Some(event) => Emit::Event(event),
            None => Emit::Skip,
        }
    }))
}
