use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Wall-clock source for countdowns.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Anchors to the wall clock once, then advances with the tokio monotonic clock,
/// so countdowns do not jump when the system time is adjusted.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor_instant: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(anchor_wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall,
            anchor_instant: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().duration_since(self.anchor_instant);
        let elapsed =
            chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_advances_with_tokio_time() {
        let anchor = Utc::now();
        let clock = MonotonicClock::anchored_at(anchor);
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!((clock.now() - anchor).num_seconds(), 90);
    }
}
