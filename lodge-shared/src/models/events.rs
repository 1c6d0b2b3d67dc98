use serde::{Deserialize, Serialize};

use super::availability::PackageAvailability;
use super::presence::PresenceCounts;

/// Payload of the `package.capacity` change feed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapacityChangedEvent {
    pub package_id: String,
    pub availability: PackageAvailability,
    /// Epoch milliseconds. Consumers drop changes older than the last applied.
    pub changed_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketPresenceUpdate {
    pub event_id: String,
    pub total_viewers: usize,
    pub total_reserving: usize,
}

impl TicketPresenceUpdate {
    pub fn new(event_id: &str, counts: PresenceCounts) -> Self {
        Self {
            event_id: event_id.to_string(),
            total_viewers: counts.total_viewers,
            total_reserving: counts.total_reserving,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HighDemandSignal {
    pub event_id: String,
    pub ticket_definition_id: String,
}

/// Everything the notifier republishes to interested views.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    TicketPresenceUpdate(TicketPresenceUpdate),
    PackageAvailability(CapacityChangedEvent),
    HighDemand(HighDemandSignal),
}

impl Notification {
    /// Event name used on SSE streams.
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::TicketPresenceUpdate(_) => "ticket-presence-update",
            Notification::PackageAvailability(_) => "package-availability",
            Notification::HighDemand(_) => "high-demand",
        }
    }
}
