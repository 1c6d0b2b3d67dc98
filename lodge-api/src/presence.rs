use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use lodge_core::{presence_topic, PresenceHub};
use lodge_notify::{tally, PresenceTracker};
use lodge_shared::{PresenceCounts, TicketPresenceUpdate};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::sse::{json_event, watch_events, Emit, EventStream};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events/{event_id}/presence", get(get_presence))
        .route("/v1/events/{event_id}/presence/stream", get(stream_presence))
}

#[derive(Debug, Deserialize)]
pub struct PresenceQuery {
    pub client_id: Option<String>,
    #[serde(default)]
    pub reserving: bool,
}

/// GET /v1/events/{event_id}/presence
async fn get_presence(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Json<PresenceCounts> {
    let members = state.hub().presence_members(&presence_topic(&event_id));
    Json(tally(&members))
}

/// GET /v1/events/{event_id}/presence/stream
/// The connection is the presence membership: disconnecting leaves the channel.
async fn stream_presence(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(query): Query<PresenceQuery>,
) -> Result<EventStream, AppError> {
    let client_id = query.client_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let hub: Arc<dyn PresenceHub> = Arc::new(state.hub().clone());
    let mut tracker =
        PresenceTracker::join(hub, Some(state.bus.clone()), &event_id, &client_id).await?;
    tracker.set_reserving(query.reserving).await?;
    let rx = tracker.watch();

    Ok(watch_events(rx, tracker, move |counts: &PresenceCounts| {
        match json_event("ticket-presence-update", &TicketPresenceUpdate::new(&event_id, *counts)) {
            Some(event) => Emit::Event(event),
            None => Emit::Skip,
        }
    }))
}
