use lodge_core::{RetryPolicy, SessionCacheFactory};
use lodge_notify::{CountdownSettings, NotificationBus};
use lodge_store::app_config::RealtimeConfig;
use lodge_store::{EventProducer, MemoryHub, MemorySessionCaches, StoreBackend};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "diagnostics")]
use lodge_notify::SyntheticLoad;
#[cfg(feature = "diagnostics")]
use std::collections::HashMap;
#[cfg(feature = "diagnostics")]
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct CapacityFeed {
    pub producer: Arc<EventProducer>,
    pub topic: String,
}

#[derive(Clone)]
pub struct AppState {
    pub backend: StoreBackend,
    pub caches: Arc<dyn SessionCacheFactory>,
    pub bus: NotificationBus,
    pub capacity_feed: Option<CapacityFeed>,
    pub realtime: RealtimeConfig,
    pub retry: RetryPolicy,
    #[cfg(feature = "diagnostics")]
    pub synthetic_load: Arc<Mutex<HashMap<String, SyntheticLoad>>>,
}

impl AppState {
    pub fn new(
        backend: StoreBackend,
        caches: Arc<dyn SessionCacheFactory>,
        realtime: RealtimeConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            caches,
            bus: NotificationBus::new(realtime.broadcast_capacity),
            capacity_feed: None,
            realtime,
            retry,
            #[cfg(feature = "diagnostics")]
            synthetic_load: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Everything in process memory; no external services.
    pub fn in_memory() -> Self {
        Self::new(
            StoreBackend::new(MemoryHub::new()),
            Arc::new(MemorySessionCaches::new()),
            RealtimeConfig::default(),
            RetryPolicy::default(),
        )
    }

    pub fn with_capacity_feed(mut self, feed: CapacityFeed) -> Self {
        self.capacity_feed = Some(feed);
        self
    }

    pub fn hub(&self) -> &MemoryHub {
        self.backend.hub()
    }

    pub fn countdown_settings(&self) -> CountdownSettings {
        CountdownSettings {
            tick: Duration::from_millis(self.realtime.tick_millis),
            expiring_soon: Duration::from_secs(self.realtime.expiring_soon_seconds),
        }
    }
}
