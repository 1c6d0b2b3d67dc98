use lodge_core::{guarded, DemandSource, LatestCell, Subscription};
use lodge_shared::{HighDemandSignal, Notification};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::bus::NotificationBus;

/// High-demand flag for one ticket type. Once raised it stays raised for the
/// lifetime of the notifier.
pub struct HighDemandNotifier {
    event_id: String,
    ticket_definition_id: String,
    flag: LatestCell<bool>,
    live: Arc<AtomicBool>,
    subscription: Option<Subscription>,
}

fn latch(flag: &LatestCell<bool>) -> bool {
    flag.set_if(true, |raised| !*raised)
}

impl HighDemandNotifier {
    /// Subscribes to the signal, then seeds the flag from the one-shot poll so
    /// views do not flash "not high demand" before the first broadcast.
    pub async fn mount(
        source: Arc<dyn DemandSource>,
        bus: Option<NotificationBus>,
        event_id: &str,
        ticket_definition_id: &str,
    ) -> Self {
        let flag = LatestCell::new(false);
        let live = Arc::new(AtomicBool::new(true));

        let cell = flag.clone();
        let signal = HighDemandSignal {
            event_id: event_id.to_string(),
            ticket_definition_id: ticket_definition_id.to_string(),
        };
        let subscription = source.subscribe_high_demand(
            event_id,
            ticket_definition_id,
            guarded(&live, move |_: ()| {
                if latch(&cell) {
                    info!(
                        "Ticket {}/{} is now high demand",
                        signal.event_id, signal.ticket_definition_id
                    );
                    if let Some(bus) = &bus {
                        bus.publish(Notification::HighDemand(signal.clone()));
                    }
                }
            }),
        );

        match source.is_ticket_high_demand(event_id, ticket_definition_id).await {
            Ok(true) => {
                latch(&flag);
            }
            Ok(false) => {}
            Err(e) => warn!(
                "High demand poll for {}/{} failed: {}",
                event_id, ticket_definition_id, e
            ),
        }

        Self {
            event_id: event_id.to_string(),
            ticket_definition_id: ticket_definition_id.to_string(),
            flag,
            live,
            subscription: Some(subscription),
        }
    }

    pub fn is_high_demand(&self) -> bool {
        self.flag.get()
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn ticket_definition_id(&self) -> &str {
        &self.ticket_definition_id
    }

    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for HighDemandNotifier {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lodge_core::{Callback, CoreError, CoreResult, DemandPublisher};
    use lodge_store::MemoryHub;

    struct BrokenPoll;

    #[async_trait]
    impl DemandSource for BrokenPoll {
        async fn is_ticket_high_demand(&self, _: &str, _: &str) -> CoreResult<bool> {
            Err(CoreError::FetchError("timeout".to_string()))
        }

        fn subscribe_high_demand(
            &self,
            event_id: &str,
            ticket_definition_id: &str,
            _: Callback<()>,
        ) -> Subscription {
            Subscription::detached(lodge_core::high_demand_topic(event_id, ticket_definition_id))
        }
    }

    #[tokio::test]
    async fn test_seeded_from_poll() {
        let hub = MemoryHub::new();
        hub.signal_high_demand("e1", "td1");

        let notifier = HighDemandNotifier::mount(Arc::new(hub.clone()), None, "e1", "td1").await;
        assert!(notifier.is_high_demand());
    }

    #[tokio::test]
    async fn test_signal_latches_true() {
        let hub = MemoryHub::new();
        let bus = NotificationBus::new(8);
        let mut rx = bus.subscribe();

        let notifier =
            HighDemandNotifier::mount(Arc::new(hub.clone()), Some(bus), "e1", "td1").await;
        assert!(!notifier.is_high_demand());

        hub.signal_high_demand("e1", "td1");
        hub.signal_high_demand("e1", "td1");
        assert!(notifier.is_high_demand());
        assert_eq!(notifier.flag.writes(), 1);

        match rx.try_recv().unwrap() {
            Notification::HighDemand(signal) => assert_eq!(signal.ticket_definition_id, "td1"),
            other => panic!("unexpected notification {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_other_ticket_types_do_not_trip() {
        let hub = MemoryHub::new();
        let notifier = HighDemandNotifier::mount(Arc::new(hub.clone()), None, "e1", "td1").await;
        hub.signal_high_demand("e1", "td2");
        assert!(!notifier.is_high_demand());
    }

    #[tokio::test]
    async fn test_failed_poll_defaults_to_false() {
        let notifier = HighDemandNotifier::mount(Arc::new(BrokenPoll), None, "e1", "td1").await;
        assert!(!notifier.is_high_demand());
    }

    #[tokio::test]
    async fn test_unmount_ignores_later_signals() {
        let hub = MemoryHub::new();
        let notifier = HighDemandNotifier::mount(Arc::new(hub.clone()), None, "e1", "td1").await;
        let flag = notifier.flag.clone();
        notifier.unmount();

        hub.signal_high_demand("e1", "td1");
        assert!(!flag.get());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
