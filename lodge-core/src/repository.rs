use async_trait::async_trait;
use lodge_shared::{PackageAvailability, PresenceSample};
use std::sync::Arc;

use crate::subscription::{Callback, Subscription};
use crate::CoreResult;

/// Remote capacity record for a package or ticket pool.
#[async_trait]
pub trait CapacitySource: Send + Sync {
    async fn fetch_availability(&self, package_id: &str) -> CoreResult<PackageAvailability>;

    /// `on_change` receives the full record after every server-side change.
    fn subscribe_availability(
        &self,
        package_id: &str,
        on_change: Callback<PackageAvailability>,
    ) -> Subscription;
}

/// Shared ephemeral presence channels.
#[async_trait]
pub trait PresenceHub: Send + Sync {
    /// Joins `topic`. `on_sync` receives every member's current sample after
    /// each change. Releasing the subscription leaves the channel.
    fn join(
        &self,
        topic: &str,
        client_id: &str,
        on_sync: Callback<Vec<PresenceSample>>,
    ) -> Subscription;

    /// Announces (or replaces) this client's sample on `topic`.
    async fn track(&self, topic: &str, sample: PresenceSample) -> CoreResult<()>;
}

/// Server-computed high-demand signal per ticket type.
#[async_trait]
pub trait DemandSource: Send + Sync {
    async fn is_ticket_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
    ) -> CoreResult<bool>;

    /// `on_signal` fires with no payload whenever the ticket type is flagged.
    fn subscribe_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
        on_signal: Callback<()>,
    ) -> Subscription;
}

/// Raises the high-demand signal. Backends and diagnostics only.
pub trait DemandPublisher: Send + Sync {
    fn signal_high_demand(&self, event_id: &str, ticket_definition_id: &str);
}

/// Durable key-value cache scoped to one client session.
#[async_trait]
pub trait ReservationCache: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> CoreResult<()>;
    async fn remove(&self, key: &str) -> CoreResult<()>;
}

pub trait SessionCacheFactory: Send + Sync {
    fn session(&self, session_id: &str) -> Arc<dyn ReservationCache>;
}
