use lodge_shared::{CapacityChangedEvent, Notification};
use lodge_notify::NotificationBus;
use lodge_store::MemoryHub;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use tracing::{debug, error, info, warn};

/// Consumes the capacity change feed and fans each change out to subscribers.
pub async fn start_capacity_worker(
    brokers: String,
    group_id: String,
    topic: String,
    hub: MemoryHub,
    bus: NotificationBus,
) -> Result<(), KafkaError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", &group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "latest")
        .create()?;

    consumer.subscribe(&[topic.as_str()])?;

    info!("Capacity worker started, listening to {}...", topic);

    loop {
        match consumer.recv().await {
            Err(e) => error!("Kafka error: {}", e),
            Ok(m) => match m.payload_view::<str>() {
                Some(Ok(payload)) => apply_capacity_change(&hub, &bus, payload),
                Some(Err(e)) => error!("Error reading payload: {}", e),
                None => warn!("Empty capacity message at offset {}", m.offset()),
            },
        }
    }
}

/// Decodes one feed message and pushes it to the hub. Malformed messages are
/// logged and skipped; stale or echoed changes are dropped by the hub.
pub fn apply_capacity_change(hub: &MemoryHub, bus: &NotificationBus, payload: &str) {
    match serde_json::from_str::<CapacityChangedEvent>(payload) {
        Ok(event) => {
            if hub.apply_change(&event) {
                info!("Capacity change for {}: {:?}", event.package_id, event.availability);
                bus.publish(Notification::PackageAvailability(event));
            } else {
                debug!("Skipped stale capacity change for {}", event.package_id);
            }
        }
        Err(e) => error!("Discarding malformed capacity change: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodge_core::CapacitySource;

    #[tokio::test]
    async fn test_feed_message_reaches_hub() {
        let hub = MemoryHub::new();
        let bus = NotificationBus::new(4);
        let mut rx = bus.subscribe();

        apply_capacity_change(
            &hub,
            &bus,
            r#"{"packageId":"P1","availability":{"available":3,"reserved":5,"sold":90,"max":100},"changedAt":0}"#,
        );

        assert_eq!(hub.fetch_availability("P1").await.unwrap().sold, 90);
        assert!(matches!(rx.try_recv().unwrap(), Notification::PackageAvailability(_)));
    }

    #[tokio::test]
    async fn test_late_echo_does_not_overwrite_newer_change() {
        let hub = MemoryHub::new();
        let bus = NotificationBus::new(8);
        let mut rx = bus.subscribe();
        let first = r#"{"packageId":"P1","availability":{"available":3,"reserved":5,"sold":90,"max":100},"changedAt":1000}"#;
        let second = r#"{"packageId":"P1","availability":{"available":0,"reserved":8,"sold":92,"max":100},"changedAt":2000}"#;

        apply_capacity_change(&hub, &bus, first);
        apply_capacity_change(&hub, &bus, second);
        apply_capacity_change(&hub, &bus, first);
        apply_capacity_change(&hub, &bus, second);

        assert_eq!(hub.fetch_availability("P1").await.unwrap().available, 0);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_message_is_skipped() {
        let hub = MemoryHub::new();
        let bus = NotificationBus::new(4);
        apply_capacity_change(&hub, &bus, "not json");
        assert!(hub.snapshot("P1").is_none());
    }
}
