//! Change-event publishing.
//!
//! Every successful state change is published as the full order JSON, keyed
//! `order-{kind}-{id}`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::Order;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio::sync::RwLock;

use crate::error::PublishError;

/// Default topic for order change events.
pub const DEFAULT_TOPIC: &str = "order-topic";

/// Kind of state change an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    Cancelled,
    Deleted,
}

impl ChangeKind {
    /// Returns the lowercase name used in event keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Cancelled => "cancelled",
            ChangeKind::Deleted => "deleted",
        }
    }

    /// Builds the event key for an order.
    pub fn event_key(&self, order: &Order) -> String {
        format!("order-{}-{}", self.as_str(), order.id)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for durable change-event sinks.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes the order under the key for `kind`, returning once the sink
    /// has acknowledged it.
    async fn publish(&self, order: &Order, kind: ChangeKind) -> Result<(), PublishError>;
}

/// Kafka publisher that waits for acknowledgement from all in-sync replicas.
#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl KafkaEventPublisher {
    /// Creates an idempotent producer against `brokers`.
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", "10000")
            .create()
            .map_err(|e| PublishError::Config(format!("failed to create Kafka producer: {}", e)))?;

        let topic = topic.into();
        tracing::info!(brokers = %brokers, topic = %topic, "Kafka event publisher created");

        Ok(Self {
            producer,
            topic,
            delivery_timeout: Duration::from_secs(10),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    #[tracing::instrument(skip(self, order), fields(id = %order.id, kind = %kind))]
    async fn publish(&self, order: &Order, kind: ChangeKind) -> Result<(), PublishError> {
        let key = kind.event_key(order);
        let payload = serde_json::to_vec(order)?;

        let record = FutureRecord::to(&self.topic)
            .key(key.as_str())
            .payload(payload.as_slice());
        let (partition, offset) = self
            .producer
            .send(record, self.delivery_timeout)
            .await
            .map_err(|(e, _)| PublishError::Delivery {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(key = %key, partition, offset, "event delivered");
        Ok(())
    }
}

/// An event captured by [`InMemoryEventPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    /// Event key.
    pub key: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Serialized order.
    pub payload: serde_json::Value,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    events: Arc<RwLock<Vec<PublishedEvent>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryEventPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent publishes fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every event published so far.
    pub async fn events(&self) -> Vec<PublishedEvent> {
        self.events.read().await.clone()
    }

    /// Returns the keys of every event published so far.
    pub async fn keys(&self) -> Vec<String> {
        self.events
            .read()
            .await
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, order: &Order, kind: ChangeKind) -> Result<(), PublishError> {
        let key = kind.event_key(order);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Delivery {
                key,
                reason: "broker unavailable".to_string(),
            });
        }

        let payload = serde_json::to_value(order)?;
        self.events.write().await.push(PublishedEvent { key, kind, payload });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    fn order(id: i64) -> Order {
        Order {
            id: OrderId::new(id),
            ..Order::default()
        }
    }

    #[test]
    fn test_event_keys() {
        let order = order(5);
        assert_eq!(ChangeKind::Created.event_key(&order), "order-created-5");
        assert_eq!(ChangeKind::Updated.event_key(&order), "order-updated-5");
        assert_eq!(ChangeKind::Cancelled.event_key(&order), "order-cancelled-5");
        assert_eq!(ChangeKind::Deleted.event_key(&order), "order-deleted-5");
    }

    #[tokio::test]
    async fn test_in_memory_records_payload() {
        let publisher = InMemoryEventPublisher::new();
        publisher.publish(&order(9), ChangeKind::Created).await.unwrap();

        let events = publisher.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "order-created-9");
        assert_eq!(events[0].payload["id"], 9);
        assert_eq!(events[0].payload["status"], "created");
    }

    #[tokio::test]
    async fn test_in_memory_failure_records_nothing() {
        let publisher = InMemoryEventPublisher::new();
        publisher.set_fail(true);

        let result = publisher.publish(&order(1), ChangeKind::Updated).await;
        assert!(matches!(result, Err(PublishError::Delivery { ref key, .. }) if key == "order-updated-1"));
        assert!(publisher.events().await.is_empty());
    }
}
