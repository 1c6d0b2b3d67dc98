use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use lodge_core::{AvailabilityView, CapacitySource};
use lodge_notify::{AvailabilityState, CapacitySubscriber};
use lodge_shared::{CapacityChangedEvent, Notification, PackageAvailability};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::sse::{json_event, watch_events, Emit, EventStream};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/packages/{package_id}/availability",
            get(get_availability).post(push_availability),
        )
        .route("/v1/packages/{package_id}/availability/stream", get(stream_availability))
}

/// GET /v1/packages/{package_id}/availability
async fn get_availability(
    State(state): State<AppState>,
    Path(package_id): Path<String>,
) -> Result<Json<AvailabilityView>, AppError> {
    let backend = &state.backend;
    let availability = state
        .retry
        .run("capacity fetch", || backend.fetch_availability(&package_id))
        .await?;
    Ok(Json(AvailabilityView::from(&availability)))
}

/// POST /v1/packages/{package_id}/availability
/// Records a capacity change and pushes it to every live subscriber. The feed
/// echo of this change is recognised by its timestamp and not applied twice.
async fn push_availability(
    State(state): State<AppState>,
    Path(package_id): Path<String>,
    Json(availability): Json<PackageAvailability>,
) -> Result<Json<AvailabilityView>, AppError> {
    let counts = [
        availability.available,
        availability.reserved,
        availability.sold,
        availability.max,
    ];
    if counts.iter().any(|count| *count < 0) {
        return Err(AppError::ValidationError(
            "capacity counts must not be negative".to_string(),
        ));
    }

    let event = CapacityChangedEvent {
        package_id: package_id.clone(),
        availability,
        changed_at: Utc::now().timestamp_millis(),
    };
    if !state.backend.record_change(&event).await? {
        warn!("Capacity change for {} superseded by a newer one", package_id);
        return Ok(Json(AvailabilityView::from(&availability)));
    }

    if let Some(feed) = &state.capacity_feed {
        if let Err(e) = feed.producer.publish_capacity_change(&feed.topic, &event).await {
            warn!(
                "Capacity change for {} not forwarded to {}: {}",
                package_id, feed.topic, e
            );
        }
    }
    state.bus.publish(Notification::PackageAvailability(event));

    info!("Capacity for {} updated: {:?}", package_id, availability);
    Ok(Json(AvailabilityView::from(&availability)))
}

/// GET /v1/packages/{package_id}/availability/stream
/// One capacity subscription per connection, released on disconnect.
async fn stream_availability(
    State(state): State<AppState>,
    Path(package_id): Path<String>,
) -> EventStream {
    let source: Arc<dyn CapacitySource> = Arc::new(state.backend.clone());
    let subscriber = CapacitySubscriber::mount(source, &package_id, state.retry.clone());
    let rx = subscriber.watch();

    watch_events(rx, subscriber, |current: &AvailabilityState| match current {
        AvailabilityState::Loading => Emit::Skip,
        AvailabilityState::Ready(availability) => {
            match json_event("package-availability", &AvailabilityView::from(availability)) {
                Some(event) => Emit::Event(event),
                None => Emit::Skip,
            }
        }
        AvailabilityState::Failed(message) => {
            match json_event("error", &serde_json::json!({ "error": message })) {
                Some(event) => Emit::Event(event),
                None => Emit::Skip,
            }
        }
    })
}
