//! Event bus implementation
//!
//! This module provides the event bus abstraction and an in-memory
//! implementation for publishing and subscribing to lifecycle events.

use crate::types::Event;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to publish event
    #[error("Failed to publish event: {0}")]
    PublishError(String),

    /// Failed to subscribe
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event whose topic matches this subscription.
    ///
    /// Events missed because the subscriber lagged behind are skipped.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if topic_matches(&self.topic, event.topic()) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "Subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(EventBusError::ChannelClosed),
            }
        }
    }
}

/// Event bus trait for publish/subscribe operations.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Topic patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more trailing segments
    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Get event bus stats.
    async fn stats(&self) -> EventBusStats;
}

/// Event bus statistics.
#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
}

/// In-memory event bus implementation.
///
/// This is suitable for single-process deployments and testing.
pub struct MemoryEventBus {
    /// Shared channel; subscriptions filter by topic
    sender: broadcast::Sender<Event>,
    /// Published events, oldest first
    history: Arc<RwLock<Vec<Event>>>,
    /// Statistics
    stats: Arc<RwLock<EventBusStats>>,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(RwLock::new(EventBusStats::default())),
        }
    }

    /// Events published so far, oldest first.
    pub async fn published(&self) -> Vec<Event> {
        self.history.read().await.clone()
    }

    /// Event types published so far, oldest first.
    pub async fn published_types(&self) -> Vec<String> {
        self.history
            .read()
            .await
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> EventBusResult<()> {
        tracing::debug!(event_type = %event.event_type, event_id = %event.id, "Publishing event");

        self.history.write().await.push(event.clone());
        self.stats.write().await.events_published += 1;

        // No receivers is not an error: nobody is listening yet.
        let _ = self.sender.send(event);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        if topic.is_empty() {
            return Err(EventBusError::SubscribeError("empty topic pattern".to_string()));
        }
        Ok(Subscription {
            topic: topic.to_string(),
            receiver: self.sender.subscribe(),
        })
    }

    async fn stats(&self) -> EventBusStats {
        let mut stats = self.stats.read().await.clone();
        stats.active_subscriptions = self.sender.receiver_count();
        stats
    }
}

/// Check if a topic matches a pattern.
fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut topic_parts = topic.split('.');
    for segment in pattern.split('.') {
        match segment {
            "#" => return true,
            "*" => {
                if topic_parts.next().is_none() {
                    return false;
                }
            }
            literal => {
                if topic_parts.next() != Some(literal) {
                    return false;
                }
            }
        }
    }
    topic_parts.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matching() {
        assert!(topic_matches("membership.status_changed", "membership.status_changed"));
        assert!(topic_matches("membership.*", "membership.status_changed"));
        assert!(topic_matches("#", "organization.registered"));
        assert!(topic_matches("organization.#", "organization.status_changed"));
        assert!(!topic_matches("membership.*", "organization.status_changed"));
        assert!(!topic_matches("membership", "membership.status_changed"));
        assert!(!topic_matches("membership.*.x", "membership.status_changed"));
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = MemoryEventBus::new();
        let mut sub = bus.subscribe("organization.*").await.unwrap();

        bus.publish(Event::new("membership.status_changed", serde_json::json!({})))
            .await
            .unwrap();
        bus.publish(Event::new("organization.status_changed", serde_json::json!({})))
            .await
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type, "organization.status_changed");

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.active_subscriptions, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_recorded() {
        let bus = MemoryEventBus::new();
        bus.publish(Event::new("organization.registered", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(bus.published_types().await, vec!["organization.registered"]);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_empty_pattern() {
        let bus = MemoryEventBus::new();
        assert!(bus.subscribe("").await.is_err());
    }
}
