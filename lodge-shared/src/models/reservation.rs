use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provisional, time-boxed hold on a ticket or package slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRecord {
    pub ticket_id: String,
    pub reservation_id: String,
    pub expires_at: DateTime<Utc>,
    pub event_id: String,
    pub ticket_definition_id: String,
}

impl ReservationRecord {
    /// Milliseconds left until `expires_at`, negative once it has passed.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_milliseconds()
    }
}
