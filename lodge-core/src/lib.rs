pub mod capacity;
pub mod cell;
pub mod clock;
pub mod countdown;
pub mod repository;
pub mod reservation;
pub mod retry;
pub mod subscription;

pub use capacity::{AvailabilityView, StatusLabel};
pub use cell::LatestCell;
pub use clock::{Clock, MonotonicClock};
pub use countdown::{format_remaining, CountdownState};
pub use repository::{
    CapacitySource, DemandPublisher, DemandSource, PresenceHub, ReservationCache,
    SessionCacheFactory,
};
pub use retry::RetryPolicy;
pub use subscription::{guarded, Callback, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Fetch failed: {0}")]
    FetchError(String),
    #[error("Realtime transport error: {0}")]
    TransportError(String),
    #[error("Reservation cache error: {0}")]
    CacheError(String),
    #[error("Serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Presence channel name for an event.
pub fn presence_topic(event_id: &str) -> String {
    format!("presence-tickets-{}", event_id)
}

/// Narrow channel name for a ticket type's high-demand signal.
pub fn high_demand_topic(event_id: &str, ticket_definition_id: &str) -> String {
    format!("high-demand-{}-{}", event_id, ticket_definition_id)
}
