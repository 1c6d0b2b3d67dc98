use chrono::{DateTime, Utc};
use lodge_core::{guarded, presence_topic, CoreResult, LatestCell, PresenceHub, Subscription};
use lodge_shared::{Notification, PresenceCounts, PresenceSample, TicketPresenceUpdate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::bus::NotificationBus;

/// Counts each client once, using the most recent sample it announced.
pub fn tally(samples: &[PresenceSample]) -> PresenceCounts {
    let mut latest: HashMap<&str, &PresenceSample> = HashMap::new();
    for sample in samples {
        latest
            .entry(sample.client_id.as_str())
            .and_modify(|current| {
                if sample.viewing_since >= current.viewing_since {
                    *current = sample;
                }
            })
            .or_insert(sample);
    }

    PresenceCounts {
        total_viewers: latest.len(),
        total_reserving: latest.values().filter(|s| s.is_reserving).count(),
    }
}

/// The member that republishes a sync: the lowest client id present in it.
fn announcer(samples: &[PresenceSample]) -> Option<&str> {
    samples.iter().map(|s| s.client_id.as_str()).min()
}

/// This client's membership of an event's presence channel.
pub struct PresenceTracker {
    hub: Arc<dyn PresenceHub>,
    topic: String,
    event_id: String,
    client_id: String,
    viewing_since: DateTime<Utc>,
    is_reserving: bool,
    counts: LatestCell<PresenceCounts>,
    live: Arc<AtomicBool>,
    subscription: Option<Subscription>,
}

impl PresenceTracker {
    /// Joins `presence-tickets-<event_id>` and announces this client as viewing.
    /// Aggregates are republished as `ticket-presence-update` on `bus` when one
    /// is given, once per sync: only the member with the lowest client id
    /// publishes. If announcing fails the channel is left before the error is
    /// returned.
    pub async fn join(
        hub: Arc<dyn PresenceHub>,
        bus: Option<NotificationBus>,
        event_id: &str,
        client_id: &str,
    ) -> CoreResult<Self> {
        let topic = presence_topic(event_id);
        let counts = LatestCell::new(PresenceCounts::default());
        let live = Arc::new(AtomicBool::new(true));

        let cell = counts.clone();
        let update_event = event_id.to_string();
        let own_id = client_id.to_string();
        let subscription = hub.join(
            &topic,
            client_id,
            guarded(&live, move |samples: Vec<PresenceSample>| {
                let aggregate = tally(&samples);
                cell.set(aggregate);
                match &bus {
                    Some(bus) if announcer(&samples) == Some(own_id.as_str()) => {
                        bus.publish(Notification::TicketPresenceUpdate(TicketPresenceUpdate::new(
                            &update_event,
                            aggregate,
                        )));
                    }
                    _ => {}
                }
            }),
        );

        let mut tracker = Self {
            hub,
            topic,
            event_id: event_id.to_string(),
            client_id: client_id.to_string(),
            viewing_since: Utc::now(),
            is_reserving: false,
            counts,
            live,
            subscription: Some(subscription),
        };
        tracker.announce().await?;
        info!("Client {} viewing tickets for event {}", tracker.client_id, tracker.event_id);
        Ok(tracker)
    }

    pub fn sample(&self) -> PresenceSample {
        PresenceSample {
            client_id: self.client_id.clone(),
            event_id: self.event_id.clone(),
            viewing_since: self.viewing_since,
            is_reserving: self.is_reserving,
        }
    }

    /// Re-announces with the new reserving flag; a no-op when unchanged.
    pub async fn set_reserving(&mut self, is_reserving: bool) -> CoreResult<()> {
        if self.is_reserving == is_reserving {
            return Ok(());
        }
        self.is_reserving = is_reserving;
        self.announce().await
    }

    async fn announce(&mut self) -> CoreResult<()> {
        let sample = self.sample();
        self.hub.track(&self.topic, sample).await
    }

    pub fn counts(&self) -> PresenceCounts {
        self.counts.get()
    }

    pub fn watch(&self) -> watch::Receiver<PresenceCounts> {
        self.counts.subscribe()
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn leave(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!("Client {} left {}", self.client_id, self.topic);
        }
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lodge_store::MemoryHub;

    fn sample(client_id: &str, is_reserving: bool, offset_secs: i64) -> PresenceSample {
        PresenceSample {
            client_id: client_id.to_string(),
            event_id: "e1".to_string(),
            viewing_since: Utc::now() + Duration::seconds(offset_secs),
            is_reserving,
        }
    }

    async fn join(
        hub: &MemoryHub,
        bus: &NotificationBus,
        event_id: &str,
        client_id: &str,
    ) -> PresenceTracker {
        PresenceTracker::join(Arc::new(hub.clone()), Some(bus.clone()), event_id, client_id)
            .await
            .unwrap()
    }

    #[test]
    fn test_tally_counts_distinct_clients() {
        let samples = vec![
            sample("a", false, 0),
            sample("b", true, 0),
            sample("a", true, 5),
            sample("c", false, 0),
        ];
        let counts = tally(&samples);
        assert_eq!(counts.total_viewers, 3);
        assert_eq!(counts.total_reserving, 2);
        assert_eq!(tally(&[]), PresenceCounts::default());
        assert_eq!(announcer(&samples), Some("a"));
        assert_eq!(announcer(&[]), None);
    }

    #[tokio::test]
    async fn test_viewers_and_reserving_are_aggregated() {
        let hub = MemoryHub::new();
        let bus = NotificationBus::new(16);
        let mut updates = bus.subscribe();

        let first = join(&hub, &bus, "e1", "a").await;
        let mut second = join(&hub, &bus, "e1", "b").await;
        second.set_reserving(true).await.unwrap();

        let expected = PresenceCounts { total_viewers: 2, total_reserving: 1 };
        assert_eq!(first.counts(), expected);
        assert_eq!(second.counts(), expected);

        let mut published = Vec::new();
        while let Ok(Notification::TicketPresenceUpdate(update)) = updates.try_recv() {
            assert_eq!(update.event_id, "e1");
            published.push((update.total_viewers, update.total_reserving));
        }
        // One update per sync, not one per member.
        assert_eq!(published, vec![(1, 0), (2, 0), (2, 1)]);
    }

    #[tokio::test]
    async fn test_leave_removes_presence_and_stops_updates() {
        let hub = MemoryHub::new();
        let bus = NotificationBus::new(16);

        let stay = join(&hub, &bus, "e1", "a").await;
        let go = join(&hub, &bus, "e1", "b").await;
        assert_eq!(stay.counts().total_viewers, 2);

        let go_counts = go.counts.clone();
        let go_writes = go_counts.writes();
        go.leave();

        assert_eq!(stay.counts().total_viewers, 1);
        assert_eq!(go_counts.writes(), go_writes);
        assert_eq!(hub.presence_members("presence-tickets-e1").len(), 1);
    }

    #[tokio::test]
    async fn test_events_are_isolated() {
        let hub = MemoryHub::new();
        let bus = NotificationBus::default();
        let one = join(&hub, &bus, "e1", "a").await;
        let _other = join(&hub, &bus, "e2", "b").await;
        assert_eq!(one.counts().total_viewers, 1);
    }
}
