use lodge_core::countdown::{display_for, EXPIRING_SOON_MS};
use lodge_core::reservation::load_reservation;
use lodge_core::{Clock, CoreResult, CountdownState, LatestCell, ReservationCache};
use lodge_shared::ReservationRecord;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownTick {
    pub reservation_id: String,
    pub remaining_ms: i64,
    pub state: CountdownState,
    pub display: String,
}

impl CountdownTick {
    pub fn compute(record: &ReservationRecord, clock: &dyn Clock, expiring_soon_ms: i64) -> Self {
        let remaining_ms = record.remaining_ms(clock.now());
        let state = CountdownState::with_threshold(remaining_ms, expiring_soon_ms);
        Self {
            reservation_id: record.reservation_id.clone(),
            remaining_ms,
            state,
            display: display_for(remaining_ms, state),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CountdownSettings {
    pub tick: Duration,
    pub expiring_soon: Duration,
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            expiring_soon: Duration::from_millis(EXPIRING_SOON_MS as u64),
        }
    }
}

/// Local display of a reservation's remaining hold time.
///
/// Reaching `Expired` is purely visual: the cached reservation is left in place
/// and nothing is sent to the booking backend. Whether the server frees the slot
/// on its own is not decided here.
pub struct ReservationCountdown {
    record: ReservationRecord,
    ticks: LatestCell<CountdownTick>,
    task: JoinHandle<()>,
}

impl ReservationCountdown {
    /// Prefers an explicitly supplied reservation, otherwise falls back to the
    /// session's cache.
    pub async fn resolve(
        explicit: Option<ReservationRecord>,
        cache: &dyn ReservationCache,
    ) -> CoreResult<Option<ReservationRecord>> {
        match explicit {
            Some(record) => Ok(Some(record)),
            None => load_reservation(cache).await,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn start(
        record: ReservationRecord,
        clock: Arc<dyn Clock>,
        settings: CountdownSettings,
    ) -> Self {
        let expiring_soon_ms = settings.expiring_soon.as_millis() as i64;
        let first = CountdownTick::compute(&record, clock.as_ref(), expiring_soon_ms);
        let ticks = LatestCell::new(first);

        let cell = ticks.clone();
        let tracked = record.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(settings.tick);
            loop {
                interval.tick().await;
                let tick = CountdownTick::compute(&tracked, clock.as_ref(), expiring_soon_ms);
                let expired = tick.state.is_expired();
                cell.set(tick);
                if expired {
                    info!(
                        "Reservation {} expired locally; keeping session active to prevent redirection",
                        tracked.reservation_id
                    );
                    break;
                }
            }
        });

        debug!("Countdown started for reservation {}", record.reservation_id);
        Self { record, ticks, task }
    }

    pub fn record(&self) -> &ReservationRecord {
        &self.record
    }

    pub fn current(&self) -> CountdownTick {
        self.ticks.get()
    }

    pub fn watch(&self) -> watch::Receiver<CountdownTick> {
        self.ticks.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops ticking. The last published tick stays readable through any
    /// receiver obtained from `watch`.
    pub fn stop(self) {
        self.task.abort();
        debug!("Countdown for {} stopped", self.record.reservation_id);
    }
}

impl Drop for ReservationCountdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}
