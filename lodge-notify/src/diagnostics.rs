//! Developer diagnostics: inspect and clear a session's reservation cache,
//! raise synthetic high-demand signals, and generate synthetic presence load.
//!
//! Only compiled with the `diagnostics` feature. Everything it touches is
//! injected at construction.

use lodge_core::reservation::{clear_reservation, RESERVATION_DATA_KEY, RESERVATION_EXPIRY_KEY};
use lodge_core::{CoreResult, DemandPublisher, PresenceHub, SessionCacheFactory};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::bus::NotificationBus;
use crate::presence::PresenceTracker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub reservation_data: Option<String>,
    pub reservation_expiry: Option<String>,
}

/// Synthetic viewers. They leave the channel when this is dropped.
pub struct SyntheticLoad {
    trackers: Vec<PresenceTracker>,
}

impl SyntheticLoad {
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

pub struct Diagnostics {
    caches: Arc<dyn SessionCacheFactory>,
    presence: Arc<dyn PresenceHub>,
    demand: Arc<dyn DemandPublisher>,
    bus: NotificationBus,
}

impl Diagnostics {
    pub fn new(
        caches: Arc<dyn SessionCacheFactory>,
        presence: Arc<dyn PresenceHub>,
        demand: Arc<dyn DemandPublisher>,
        bus: NotificationBus,
    ) -> Self {
        Self { caches, presence, demand, bus }
    }

    pub async fn inspect_cache(&self, session_id: &str) -> CoreResult<CacheSnapshot> {
        let cache = self.caches.session(session_id);
        Ok(CacheSnapshot {
            reservation_data: cache.get(RESERVATION_DATA_KEY).await?,
            reservation_expiry: cache.get(RESERVATION_EXPIRY_KEY).await?,
        })
    }

    pub async fn clear_cache(&self, session_id: &str) -> CoreResult<()> {
        let cache = self.caches.session(session_id);
        clear_reservation(cache.as_ref()).await?;
        info!("Diagnostics cleared reservation cache for session {}", session_id);
        Ok(())
    }

    pub fn simulate_high_demand(&self, event_id: &str, ticket_definition_id: &str) {
        info!("Diagnostics raising high demand for {}/{}", event_id, ticket_definition_id);
        self.demand.signal_high_demand(event_id, ticket_definition_id);
    }

    /// Joins `viewers` synthetic clients to the event, the first `reserving` of
    /// them flagged as reserving.
    pub async fn simulate_viewers(
        &self,
        event_id: &str,
        viewers: usize,
        reserving: usize,
    ) -> CoreResult<SyntheticLoad> {
        let mut trackers = Vec::with_capacity(viewers);
        for n in 0..viewers {
            let client_id = format!("synthetic-{}-{}", event_id, uuid::Uuid::new_v4());
            let bus = Some(self.bus.clone());
            let mut tracker =
                PresenceTracker::join(self.presence.clone(), bus, event_id, &client_id).await?;
            if n < reserving {
                tracker.set_reserving(true).await?;
            }
            trackers.push(tracker);
        }
        info!("Diagnostics joined {} synthetic viewers to event {}", viewers, event_id);
        Ok(SyntheticLoad { trackers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lodge_core::presence_topic;
    use lodge_core::reservation::store_reservation;
    use lodge_core::DemandSource;
    use lodge_shared::ReservationRecord;
    use lodge_store::{MemoryHub, MemorySessionCaches};

    fn diagnostics(hub: &MemoryHub, caches: Arc<MemorySessionCaches>) -> Diagnostics {
        Diagnostics::new(
            caches,
            Arc::new(hub.clone()),
            Arc::new(hub.clone()),
            NotificationBus::default(),
        )
    }

    #[tokio::test]
    async fn test_inspect_and_clear_cache() {
        let hub = MemoryHub::new();
        let caches = Arc::new(MemorySessionCaches::new());
        let record = ReservationRecord {
            ticket_id: "t".to_string(),
            reservation_id: "r".to_string(),
            expires_at: Utc::now(),
            event_id: "e".to_string(),
            ticket_definition_id: "td".to_string(),
        };
        store_reservation(caches.session("s1").as_ref(), &record).await.unwrap();

        let diag = diagnostics(&hub, caches.clone());
        let snapshot = diag.inspect_cache("s1").await.unwrap();
        assert!(snapshot.reservation_data.is_some());
        assert!(snapshot.reservation_expiry.is_some());

        diag.clear_cache("s1").await.unwrap();
        let snapshot = diag.inspect_cache("s1").await.unwrap();
        assert_eq!(snapshot, CacheSnapshot { reservation_data: None, reservation_expiry: None });
    }

    #[tokio::test]
    async fn test_synthetic_load_joins_and_leaves() {
        let hub = MemoryHub::new();
        let diag = diagnostics(&hub, Arc::new(MemorySessionCaches::new()));

        let load = diag.simulate_viewers("e1", 5, 2).await.unwrap();
        assert_eq!(load.len(), 5);
        let members = hub.presence_members(&presence_topic("e1"));
        assert_eq!(members.len(), 5);
        assert_eq!(members.iter().filter(|m| m.is_reserving).count(), 2);

        drop(load);
        assert!(hub.presence_members(&presence_topic("e1")).is_empty());
    }

    #[tokio::test]
    async fn test_simulated_demand_is_visible_to_polls() {
        let hub = MemoryHub::new();
        let diag = diagnostics(&hub, Arc::new(MemorySessionCaches::new()));
        diag.simulate_high_demand("e1", "td1");
        assert!(hub.is_ticket_high_demand("e1", "td1").await.unwrap());
    }
}
