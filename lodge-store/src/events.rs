use lodge_core::{CoreError, CoreResult};
use lodge_shared::CapacityChangedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    /// Keyed by package so a package's changes stay ordered within a partition.
    pub async fn publish_capacity_change(
        &self,
        topic: &str,
        event: &CapacityChangedEvent,
    ) -> CoreResult<()> {
        let payload = serde_json::to_string(event)?;
        self.publish(topic, &event.package_id, &payload)
            .await
            .map_err(|e| CoreError::TransportError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodge_shared::PackageAvailability;

    #[tokio::test]
    async fn test_undeliverable_change_is_reported() {
        let producer = EventProducer::new("127.0.0.1:1").unwrap();
        let event = CapacityChangedEvent {
            package_id: "P1".to_string(),
            availability: PackageAvailability::new(1, 0, 0, 1),
            changed_at: 0,
        };

        let result = producer.publish_capacity_change("package.capacity", &event).await;
        assert!(matches!(result, Err(CoreError::TransportError(_))));
    }
}
