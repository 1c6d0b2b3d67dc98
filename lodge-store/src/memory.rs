//! In-process realtime backend.
//!
//! `MemoryHub` stands in for the managed backend's change feed, presence and
//! broadcast channels. The Kafka capacity worker and admin pushes write into it;
//! mounted notifiers subscribe to it.

use async_trait::async_trait;
use lodge_core::{
    high_demand_topic, Callback, CapacitySource, CoreError, CoreResult, DemandPublisher,
    DemandSource, PresenceHub, ReservationCache, SessionCacheFactory, Subscription,
};
use lodge_shared::{CapacityChangedEvent, PackageAvailability, PresenceSample};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type ListenerId = u64;

struct PresenceMember {
    client_id: String,
    sample: Option<PresenceSample>,
    on_sync: Callback<Vec<PresenceSample>>,
}

#[derive(Default)]
struct HubState {
    next_id: ListenerId,
    availability: HashMap<String, PackageAvailability>,
    changed_at: HashMap<String, i64>,
    capacity_listeners: HashMap<String, Vec<(ListenerId, Callback<PackageAvailability>)>>,
    high_demand: HashSet<String>,
    demand_listeners: HashMap<String, Vec<(ListenerId, Callback<()>)>>,
    presence: HashMap<String, HashMap<ListenerId, PresenceMember>>,
}

impl HubState {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        self.next_id
    }

    fn capacity_callbacks(&self, package_id: &str) -> Vec<Callback<PackageAvailability>> {
        self.capacity_listeners
            .get(package_id)
            .map(|l| l.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }

    /// Samples of every member that has tracked, plus the callbacks to notify.
    fn presence_sync(
        &self,
        topic: &str) -> (Vec<PresenceSample>, Vec<Callback<Vec<PresenceSample>>>,
    ) {
        match self.presence.get(topic) {
            Some(members) => (
                members.values().filter_map(|m| m.sample.clone()).collect(),
                members.values().map(|m| m.on_sync.clone()).collect(),
            ),
            None => (Vec::new(), Vec::new()),
        }
    }
}

/// Callbacks are always invoked after the state lock is released.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // A panicking callback never runs under the lock, so poisoning only
        // means a bookkeeping panic; the maps are still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the package's record and notifies every subscriber.
    pub fn publish_availability(&self, package_id: &str, availability: PackageAvailability) {
        let listeners = {
            let mut state = self.lock();
            state.availability.insert(package_id.to_string(), availability);
            state.capacity_callbacks(package_id)
        };
        fan_out(package_id, availability, listeners);
    }

    /// Applies a timestamped change unless a newer one for the same package has
    /// already landed. Returns `false` for stale changes and for repeats of the
    /// change currently applied, e.g. the feed echoing a local push.
    pub fn apply_change(&self, event: &CapacityChangedEvent) -> bool {
        let listeners = {
            let mut state = self.lock();
            if let Some(&last) = state.changed_at.get(&event.package_id) {
                let current = state.availability.get(&event.package_id).copied();
                let echoed = event.changed_at == last && current == Some(event.availability);
                if event.changed_at < last || echoed {
                    debug!(
                        "Ignoring capacity change for {} at {} (last applied {})",
                        event.package_id, event.changed_at, last
                    );
                    return false;
                }
            }
            state.changed_at.insert(event.package_id.clone(), event.changed_at);
            state.availability.insert(event.package_id.clone(), event.availability);
            state.capacity_callbacks(&event.package_id)
        };
        fan_out(&event.package_id, event.availability, listeners);
        true
    }

    /// Timestamp of the last applied change for the package, if any.
    pub fn last_change_at(&self, package_id: &str) -> Option<i64> {
        self.lock().changed_at.get(package_id).copied()
    }

    pub fn snapshot(&self, package_id: &str) -> Option<PackageAvailability> {
        self.lock().availability.get(package_id).copied()
    }

    pub fn is_flagged(&self, event_id: &str, ticket_definition_id: &str) -> bool {
        self.lock().high_demand.contains(&high_demand_topic(event_id, ticket_definition_id))
    }

    /// Open subscriptions across capacity, demand and presence channels.
    pub fn subscriber_count(&self) -> usize {
        let state = self.lock();
        state.capacity_listeners.values().map(Vec::len).sum::<usize>()
            + state.demand_listeners.values().map(Vec::len).sum::<usize>()
            + state.presence.values().map(HashMap::len).sum::<usize>()
    }

    pub fn presence_members(&self, topic: &str) -> Vec<PresenceSample> {
        self.lock().presence_sync(topic).0
    }

    fn leave(&self, topic: &str, member_id: ListenerId) {
        let (samples, callbacks) = {
            let mut state = self.lock();
            let removed = match state.presence.get_mut(topic) {
                Some(members) => {
                    let removed = members.remove(&member_id);
                    if members.is_empty() {
                        state.presence.remove(topic);
                    }
                    removed
                }
                None => None,
            };
            match removed {
                Some(member) => debug!("{} left {}", member.client_id, topic),
                None => return,
            }
            state.presence_sync(topic)
        };
        for cb in callbacks {
            cb(samples.clone());
        }
    }
}

fn fan_out(
    package_id: &str,
    availability: PackageAvailability,
    listeners: Vec<Callback<PackageAvailability>>,
) {
    debug!("Capacity change for {} fanned out to {} subscribers", package_id, listeners.len());
    for cb in listeners {
        cb(availability);
    }
}

fn remove_listener<T>(
    listeners: &mut HashMap<String, Vec<(ListenerId, T)>>,
    key: &str,
    id: ListenerId,
) {
    if let Some(list) = listeners.get_mut(key) {
        list.retain(|(listener, _)| *listener != id);
        if list.is_empty() {
            listeners.remove(key);
        }
    }
}

#[async_trait]
impl CapacitySource for MemoryHub {
    async fn fetch_availability(&self, package_id: &str) -> CoreResult<PackageAvailability> {
        self.snapshot(package_id)
            .ok_or_else(|| CoreError::NotFound(format!("package {}", package_id)))
    }

    fn subscribe_availability(
        &self,
        package_id: &str,
        on_change: Callback<PackageAvailability>,
    ) -> Subscription {
        let id = {
            let mut state = self.lock();
            let id = state.next_id();
            state
                .capacity_listeners
                .entry(package_id.to_string())
                .or_default()
                .push((id, on_change));
            id
        };

        let hub = self.clone();
        let key = package_id.to_string();
        Subscription::new(format!("capacity-{}", package_id), move || {
            remove_listener(&mut hub.lock().capacity_listeners, &key, id);
        })
    }
}

#[async_trait]
impl DemandSource for MemoryHub {
    async fn is_ticket_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
    ) -> CoreResult<bool> {
        Ok(self.is_flagged(event_id, ticket_definition_id))
    }

    fn subscribe_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
        on_signal: Callback<()>,
    ) -> Subscription {
        let topic = high_demand_topic(event_id, ticket_definition_id);
        let id = {
            let mut state = self.lock();
            let id = state.next_id();
            state.demand_listeners.entry(topic.clone()).or_default().push((id, on_signal));
            id
        };

        let hub = self.clone();
        let key = topic.clone();
        Subscription::new(topic, move || {
            remove_listener(&mut hub.lock().demand_listeners, &key, id);
        })
    }
}

impl DemandPublisher for MemoryHub {
    fn signal_high_demand(&self, event_id: &str, ticket_definition_id: &str) {
        let topic = high_demand_topic(event_id, ticket_definition_id);
        let listeners: Vec<_> = {
            let mut state = self.lock();
            state.high_demand.insert(topic.clone());
            state
                .demand_listeners
                .get(&topic)
                .map(|l| l.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default()
        };
        debug!("High demand signal on {} to {} subscribers", topic, listeners.len());
        for cb in listeners {
            cb(());
        }
    }
}

#[async_trait]
impl PresenceHub for MemoryHub {
    fn join(
        &self,
        topic: &str,
        client_id: &str,
        on_sync: Callback<Vec<PresenceSample>>,
    ) -> Subscription {
        let id = {
            let mut state = self.lock();
            let id = state.next_id();
            state.presence.entry(topic.to_string()).or_default().insert(
                id,
                PresenceMember {
                    client_id: client_id.to_string(),
                    sample: None,
                    on_sync,
                },
            );
            id
        };
        debug!("{} joined {}", client_id, topic);

        let hub = self.clone();
        let key = topic.to_string();
        Subscription::new(topic, move || hub.leave(&key, id))
    }

    async fn track(&self, topic: &str, sample: PresenceSample) -> CoreResult<()> {
        let (samples, callbacks) = {
            let mut state = self.lock();
            let members = state
                .presence
                .get_mut(topic)
                .ok_or_else(|| CoreError::TransportError(format!("not joined to {}", topic)))?;

            let mut tracked = false;
            for member in members.values_mut().filter(|m| m.client_id == sample.client_id) {
                member.sample = Some(sample.clone());
                tracked = true;
            }
            if !tracked {
                return Err(CoreError::TransportError(format!(
                    "{} has not joined {}",
                    sample.client_id, topic
                )));
            }
            state.presence_sync(topic)
        };
        for cb in callbacks {
            cb(samples.clone());
        }
        Ok(())
    }
}

/// Reservation cache held in process memory.
#[derive(Default)]
pub struct MemoryReservationCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryReservationCache {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReservationCache for MemoryReservationCache {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CoreResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySessionCaches {
    sessions: Mutex<HashMap<String, Arc<MemoryReservationCache>>>,
}

impl MemorySessionCaches {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCacheFactory for MemorySessionCaches {
    fn session(&self, session_id: &str) -> Arc<dyn ReservationCache> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.entry(session_id.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lodge_core::presence_topic;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(client_id: &str, is_reserving: bool) -> PresenceSample {
        PresenceSample {
            client_id: client_id.to_string(),
            event_id: "e1".to_string(),
            viewing_since: Utc::now(),
            is_reserving,
        }
    }

    #[tokio::test]
    async fn test_capacity_fetch_and_push() {
        let hub = MemoryHub::new();
        assert!(matches!(hub.fetch_availability("P1").await, Err(CoreError::NotFound(_))));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = hub.subscribe_availability(
            "P1",
            Arc::new(move |a: PackageAvailability| sink.lock().unwrap().push(a)),
        );

        hub.publish_availability("P1", PackageAvailability::new(3, 5, 90, 100));
        hub.publish_availability("P2", PackageAvailability::new(1, 0, 0, 1));
        assert_eq!(hub.fetch_availability("P1").await.unwrap().available, 3);
        assert_eq!(seen.lock().unwrap().len(), 1);

        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(), 0);
        hub.publish_availability("P1", PackageAvailability::new(0, 8, 92, 100));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    fn change(
        package_id: &str,
        availability: PackageAvailability,
        changed_at: i64,
    ) -> CapacityChangedEvent {
        CapacityChangedEvent { package_id: package_id.to_string(), availability, changed_at }
    }

    #[tokio::test]
    async fn test_older_change_does_not_roll_back_newer_one() {
        let hub = MemoryHub::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let _sub = hub.subscribe_availability("P1", Arc::new(move |_: PackageAvailability| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let older = change("P1", PackageAvailability::new(3, 5, 90, 100), 1_000);
        let newer = change("P1", PackageAvailability::new(0, 8, 92, 100), 2_000);
        assert!(hub.apply_change(&older));
        assert!(hub.apply_change(&newer));

        assert!(!hub.apply_change(&older));
        assert!(!hub.apply_change(&newer));
        assert_eq!(hub.snapshot("P1"), Some(newer.availability));
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        let same_instant = change("P1", PackageAvailability::new(1, 7, 92, 100), 2_000);
        assert!(hub.apply_change(&same_instant));
        assert_eq!(hub.snapshot("P1"), Some(same_instant.availability));
    }

    #[tokio::test]
    async fn test_presence_sync_and_leave() {
        let hub = MemoryHub::new();
        let topic = presence_topic("e1");
        let last = Arc::new(Mutex::new(Vec::new()));
        let sink = last.clone();

        let a = hub.join(
            &topic,
            "a",
            Arc::new(move |s: Vec<PresenceSample>| *sink.lock().unwrap() = s),
        );
        let b = hub.join(&topic, "b", Arc::new(|_: Vec<PresenceSample>| {}));
        hub.track(&topic, sample("a", false)).await.unwrap();
        hub.track(&topic, sample("b", true)).await.unwrap();
        assert_eq!(last.lock().unwrap().len(), 2);

        drop(b);
        assert_eq!(last.lock().unwrap().len(), 1);
        assert_eq!(last.lock().unwrap()[0].client_id, "a");

        a.unsubscribe();
        assert!(hub.presence_members(&topic).is_empty());
    }

    #[tokio::test]
    async fn test_track_without_join_is_rejected() {
        let hub = MemoryHub::new();
        let result = hub.track(&presence_topic("e1"), sample("ghost", false)).await;
        assert!(matches!(result, Err(CoreError::TransportError(_))));
    }

    #[tokio::test]
    async fn test_high_demand_signal() {
        let hub = MemoryHub::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _sub = hub.subscribe_high_demand("e1", "td1", Arc::new(move |_: ()| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!hub.is_ticket_high_demand("e1", "td1").await.unwrap());
        hub.signal_high_demand("e1", "td2");
        hub.signal_high_demand("e1", "td1");
        assert!(hub.is_ticket_high_demand("e1", "td1").await.unwrap());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_caches_are_isolated() {
        let caches = MemorySessionCaches::new();
        caches.session("s1").set("reservation_expiry", "1").await.unwrap();
        let expiry = caches.session("s1").get("reservation_expiry").await.unwrap();
        assert_eq!(expiry.as_deref(), Some("1"));
        assert!(caches.session("s2").get("reservation_expiry").await.unwrap().is_none());
    }
}
