use axum::{
    extract::{Query, State},
    response::sse::{KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::future;
use futures_util::stream::StreamExt;
use lodge_shared::Notification;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::sse::{json_event, EventStream};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/notifications/stream", get(stream_notifications))
}

/// Narrows the feed to one event and/or one package. Without either, every
/// notification is delivered.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    pub event_id: Option<String>,
    pub package_id: Option<String>,
}

impl NotificationFilter {
    pub fn wants(&self, notification: &Notification) -> bool {
        if self.event_id.is_none() && self.package_id.is_none() {
            return true;
        }
        match notification {
            Notification::TicketPresenceUpdate(update) => {
                self.event_id.as_deref() == Some(update.event_id.as_str())
            }
            Notification::HighDemand(signal) => {
                self.event_id.as_deref() == Some(signal.event_id.as_str())
            }
            Notification::PackageAvailability(change) => {
                self.package_id.as_deref() == Some(change.package_id.as_str())
            }
        }
    }
}

/// GET /v1/notifications/stream?event_id=&package_id=
/// Every notifier update republished in this process, as SSE.
async fn stream_notifications(
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> EventStream {
    let stream = BroadcastStream::new(state.bus.subscribe()).filter_map(move |received| {
        let frame = match received {
            Ok(notification) if filter.wants(&notification) => {
                json_event(notification.event_name(), &notification).map(Ok::<_, Infallible>)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Notification stream fell behind: {}", e);
                None
            }
        };
        future::ready(frame)
    });

    Sse::new(stream.boxed()).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodge_shared::{CapacityChangedEvent, HighDemandSignal, PackageAvailability};

    #[test]
    fn test_filter_narrows_by_subject() {
        let demand = Notification::HighDemand(HighDemandSignal {
            event_id: "E1".to_string(),
            ticket_definition_id: "T1".to_string(),
        });
        let capacity = Notification::PackageAvailability(CapacityChangedEvent {
            package_id: "P1".to_string(),
            availability: PackageAvailability::new(1, 0, 0, 1),
            changed_at: 0,
        });

        assert!(NotificationFilter::default().wants(&demand));
        assert!(NotificationFilter::default().wants(&capacity));

        let event_only = NotificationFilter { event_id: Some("E1".to_string()), package_id: None };
        assert!(event_only.wants(&demand));
        assert!(!event_only.wants(&capacity));

        let other_event = NotificationFilter { event_id: Some("E2".to_string()), package_id: None };
        assert!(!other_event.wants(&demand));

        let package_only = NotificationFilter {
            event_id: None,
            package_id: Some("P1".to_string()),
        };
        assert!(package_only.wants(&capacity));
        assert!(!package_only.wants(&demand));
    }
}
