use async_trait::async_trait;
use lodge_core::{
    Callback, CapacitySource, CoreError, CoreResult, DemandPublisher, DemandSource, Subscription,
};
use lodge_shared::{CapacityChangedEvent, PackageAvailability};
use std::sync::Arc;
use tracing::{error, warn};

use crate::database::DbClient;
use crate::memory::MemoryHub;
use crate::redis_repo::RedisClient;

/// Realtime sources backed by whatever storage is configured.
///
/// Reads go to Postgres when present and fall back to the hub's last pushed
/// snapshot. Change subscriptions always come from the hub, which the capacity
/// worker and admin pushes keep current.
#[derive(Clone)]
pub struct StoreBackend {
    hub: MemoryHub,
    db: Option<Arc<DbClient>>,
    redis: Option<Arc<RedisClient>>,
}

impl StoreBackend {
    pub fn new(hub: MemoryHub) -> Self {
        Self { hub, db: None, redis: None }
    }

    pub fn with_db(mut self, db: Arc<DbClient>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.redis = Some(redis);
        self
    }

    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }

    /// Records a capacity change and fans it out to subscribers. Returns
    /// `false` when a newer change for the package was already applied, in
    /// which case nothing is written.
    pub async fn record_change(&self, event: &CapacityChangedEvent) -> CoreResult<bool> {
        if let Some(snapshot) = self.hub.last_change_at(&event.package_id) {
            if event.changed_at < snapshot {
                return Ok(false);
            }
        }
        if let Some(db) = &self.db {
            db.upsert_package_availability(&event.package_id, &event.availability)
                .await
                .map_err(|e| CoreError::TransportError(e.to_string()))?;
        }
        Ok(self.hub.apply_change(event))
    }
}

#[async_trait]
impl CapacitySource for StoreBackend {
    async fn fetch_availability(&self, package_id: &str) -> CoreResult<PackageAvailability> {
        if let Some(db) = &self.db {
            match db.fetch_package_availability(package_id).await {
                Ok(Some(availability)) => return Ok(availability),
                Ok(None) => {}
                Err(e) => {
                    error!("Capacity fetch for {} failed: {}", package_id, e);
                    return Err(CoreError::FetchError(e.to_string()));
                }
            }
        }
        self.hub.fetch_availability(package_id).await
    }

    fn subscribe_availability(
        &self,
        package_id: &str,
        on_change: Callback<PackageAvailability>,
    ) -> Subscription {
        self.hub.subscribe_availability(package_id, on_change)
    }
}

#[async_trait]
impl DemandSource for StoreBackend {
    async fn is_ticket_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
    ) -> CoreResult<bool> {
        if self.hub.is_flagged(event_id, ticket_definition_id) {
            return Ok(true);
        }
        if let Some(redis) = &self.redis {
            if redis
                .is_high_demand(event_id, ticket_definition_id)
                .await
                .map_err(|e| CoreError::FetchError(e.to_string()))?
            {
                return Ok(true);
            }
        }
        if let Some(db) = &self.db {
            return db
                .is_ticket_high_demand(event_id, ticket_definition_id)
                .await
                .map_err(|e| CoreError::FetchError(e.to_string()));
        }
        Ok(false)
    }

    fn subscribe_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
        on_signal: Callback<()>,
    ) -> Subscription {
        self.hub.subscribe_high_demand(event_id, ticket_definition_id, on_signal)
    }
}

impl DemandPublisher for StoreBackend {
    fn signal_high_demand(&self, event_id: &str, ticket_definition_id: &str) {
        self.hub.signal_high_demand(event_id, ticket_definition_id);

        if let Some(redis) = self.redis.clone() {
            let event_id = event_id.to_string();
            let ticket_definition_id = ticket_definition_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = redis.set_high_demand(&event_id, &ticket_definition_id).await {
                    warn!(
                        "Failed to persist high demand flag for {}/{}: {}",
                        event_id, ticket_definition_id, e
                    );
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_only_backend() {
        let backend = StoreBackend::new(MemoryHub::new());
        assert!(backend.fetch_availability("P1").await.is_err());

        let change = |availability, changed_at| CapacityChangedEvent {
            package_id: "P1".to_string(),
            availability,
            changed_at,
        };
        let fresh = change(PackageAvailability::new(3, 5, 90, 100), 2);
        let stale = change(PackageAvailability::new(9, 0, 0, 100), 1);
        assert!(backend.record_change(&fresh).await.unwrap());
        assert!(!backend.record_change(&stale).await.unwrap());
        assert_eq!(backend.fetch_availability("P1").await.unwrap().sold, 90);

        assert!(!backend.is_ticket_high_demand("e1", "td1").await.unwrap());
        backend.signal_high_demand("e1", "td1");
        assert!(backend.is_ticket_high_demand("e1", "td1").await.unwrap());
    }
}
