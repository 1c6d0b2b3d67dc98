use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use lodge_core::{DemandPublisher, DemandSource};
use lodge_notify::HighDemandNotifier;
use lodge_shared::{HighDemandSignal, Notification};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::sse::{json_event, watch_events, Emit, EventStream};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/events/{event_id}/tickets/{ticket_definition_id}/demand",
            get(get_demand).post(signal_demand),
        )
        .route(
            "/v1/events/{event_id}/tickets/{ticket_definition_id}/demand/stream",
            get(stream_demand),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandResponse {
    pub event_id: String,
    pub ticket_definition_id: String,
    pub high_demand: bool,
}

/// GET /v1/events/{event_id}/tickets/{ticket_definition_id}/demand
async fn get_demand(
    State(state): State<AppState>,
    Path((event_id, ticket_definition_id)): Path<(String, String)>,
) -> Result<Json<DemandResponse>, AppError> {
    let high_demand = state.backend.is_ticket_high_demand(&event_id, &ticket_definition_id).await?;
    Ok(Json(DemandResponse { event_id, ticket_definition_id, high_demand }))
}

/// POST /v1/events/{event_id}/tickets/{ticket_definition_id}/demand
/// Raises the scarcity signal for a ticket type.
async fn signal_demand(
    State(state): State<AppState>,
    Path((event_id, ticket_definition_id)): Path<(String, String)>,
) -> StatusCode {
    state.backend.signal_high_demand(&event_id, &ticket_definition_id);
    state.bus.publish(Notification::HighDemand(HighDemandSignal {
        event_id,
        ticket_definition_id,
    }));
    StatusCode::ACCEPTED
}

/// GET /v1/events/{event_id}/tickets/{ticket_definition_id}/demand/stream
/// Emits the seeded flag, then closes once the flag latches true.
async fn stream_demand(
    State(state): State<AppState>,
    Path((event_id, ticket_definition_id)): Path<(String, String)>,
) -> EventStream {
    let source: Arc<dyn DemandSource> = Arc::new(state.backend.clone());
    let notifier = HighDemandNotifier::mount(source, None, &event_id, &ticket_definition_id).await;
    let rx = notifier.watch();

    watch_events(rx, notifier, move |high_demand: &bool| {
        let payload = DemandResponse {
            event_id: event_id.clone(),
            ticket_definition_id: ticket_definition_id.clone(),
            high_demand: *high_demand,
        };
        match json_event("high-demand", &payload) {
            Some(event) if *high_demand => Emit::Last(event),
            Some(event) => Emit::Event(event),
            None => Emit::Skip,
        }
    })
}
