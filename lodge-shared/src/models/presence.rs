use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What one connected client announces on an event's presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSample {
    pub client_id: String,
    pub event_id: String,
    pub viewing_since: DateTime<Utc>,
    pub is_reserving: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceCounts {
    pub total_viewers: usize,
    pub total_reserving: usize,
}
