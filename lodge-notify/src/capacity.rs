use lodge_core::capacity::AvailabilityView;
use lodge_core::{guarded, CapacitySource, LatestCell, RetryPolicy, Subscription};
use lodge_shared::PackageAvailability;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityState {
    Loading,
    Ready(PackageAvailability),
    Failed(String),
}

impl AvailabilityState {
    pub fn availability(&self) -> Option<&PackageAvailability> {
        match self {
            AvailabilityState::Ready(availability) => Some(availability),
            _ => None,
        }
    }

    pub fn view(&self) -> Option<AvailabilityView> {
        self.availability().map(AvailabilityView::from)
    }
}

/// Live capacity for one package, for as long as it stays mounted.
///
/// Mounting registers the change subscription and starts the initial fetch.
/// The fetch result only lands while the state is still `Loading`, so a push
/// that raced ahead of it is never overwritten by an older snapshot.
pub struct CapacitySubscriber {
    package_id: String,
    state: LatestCell<AvailabilityState>,
    live: Arc<AtomicBool>,
    subscription: Option<Subscription>,
    initial_fetch: Option<JoinHandle<()>>,
}

impl CapacitySubscriber {
    /// Must be called from within a tokio runtime.
    pub fn mount(source: Arc<dyn CapacitySource>, package_id: &str, retry: RetryPolicy) -> Self {
        let state = LatestCell::new(AvailabilityState::Loading);
        let live = Arc::new(AtomicBool::new(true));

        let cell = state.clone();
        let subscription = source.subscribe_availability(
            package_id,
            guarded(&live, move |availability: PackageAvailability| {
                cell.set(AvailabilityState::Ready(availability));
            }),
        );

        let cell = state.clone();
        let fetch_live = live.clone();
        let id = package_id.to_string();
        let initial_fetch = tokio::spawn(async move {
            let result = retry
                .run("capacity fetch", || source.fetch_availability(&id))
                .await;
            if !fetch_live.load(Ordering::Acquire) {
                return;
            }
            let next = match result {
                Ok(availability) => AvailabilityState::Ready(availability),
                Err(e) => {
                    warn!("Initial availability fetch for {} failed: {}", id, e);
                    AvailabilityState::Failed(format!("Unable to load availability: {}", e))
                }
            };
            cell.set_if(next, |current| *current == AvailabilityState::Loading);
        });

        debug!("Mounted capacity subscriber for {}", package_id);
        Self {
            package_id: package_id.to_string(),
            state,
            live,
            subscription: Some(subscription),
            initial_fetch: Some(initial_fetch),
        }
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn state(&self) -> AvailabilityState {
        self.state.get()
    }

    pub fn view(&self) -> Option<AvailabilityView> {
        self.state.get().view()
    }

    pub fn watch(&self) -> watch::Receiver<AvailabilityState> {
        self.state.subscribe()
    }

    /// Number of state writes since mount.
    pub fn updates(&self) -> u64 {
        self.state.writes()
    }

    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(fetch) = self.initial_fetch.take() {
            fetch.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!("Unmounted capacity subscriber for {}", self.package_id);
        }
    }
}

impl Drop for CapacitySubscriber {
    fn drop(&mut self) {
        self.teardown();
    }
}
