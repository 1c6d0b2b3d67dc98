use serde::{Deserialize, Serialize};

/// Remaining time at or under which a reservation is shown as expiring soon.
pub const EXPIRING_SOON_MS: i64 = 120_000;

pub const EXPIRED_DISPLAY: &str = "Expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CountdownState {
    Active,
    ExpiringSoon,
    Expired,
}

impl CountdownState {
    pub fn from_remaining(remaining_ms: i64) -> Self {
        Self::with_threshold(remaining_ms, EXPIRING_SOON_MS)
    }

    pub fn with_threshold(remaining_ms: i64, expiring_soon_ms: i64) -> Self {
        if remaining_ms <= 0 {
            CountdownState::Expired
        } else if remaining_ms <= expiring_soon_ms {
            CountdownState::ExpiringSoon
        } else {
            CountdownState::Active
        }
    }

    pub fn is_expired(&self) -> bool {
        *self == CountdownState::Expired
    }
}

/// `m:ss` with seconds floored. Anything not positive renders `0:00`.
pub fn format_remaining(remaining_ms: i64) -> String {
    let total_seconds = remaining_ms.max(0) / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// What a countdown view shows for a given remaining time.
pub fn display_for(remaining_ms: i64, state: CountdownState) -> String {
    match state {
        CountdownState::Expired => EXPIRED_DISPLAY.to_string(),
        _ => format_remaining(remaining_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_boundaries() {
        assert_eq!(CountdownState::from_remaining(-5), CountdownState::Expired);
        assert_eq!(CountdownState::from_remaining(0), CountdownState::Expired);
        assert_eq!(CountdownState::from_remaining(1), CountdownState::ExpiringSoon);
        assert_eq!(CountdownState::from_remaining(120_000), CountdownState::ExpiringSoon);
        assert_eq!(CountdownState::from_remaining(120_001), CountdownState::Active);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(125_000), "2:05");
        assert_eq!(format_remaining(59_000), "0:59");
        assert_eq!(format_remaining(59_999), "0:59");
        assert_eq!(format_remaining(900_000), "15:00");
        assert_eq!(format_remaining(-1_000), "0:00");
    }

    #[test]
    fn test_expired_display() {
        assert_eq!(display_for(0, CountdownState::Expired), "Expired");
        assert_eq!(display_for(61_000, CountdownState::ExpiringSoon), "1:01");
    }
}
