//! Broadcast Hub
//!
//! Tracks pub/sub connections and their topic subscriptions, and fans
//! published events out to every subscriber of a topic. Publishing to a
//! topic nobody listens on is a no-op.

use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::{ServerMessage, WsEvent, SYSTEM_TOPIC, WATER_DATA_TOPIC};

/// Unique identifier for a pub/sub connection
pub type ConnectionId = String;

/// Manages pub/sub connections and subscriptions
pub struct BroadcastHub {
    /// Active connections: ConnectionId → ConnectionHandle
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    /// Topic subscriptions: Topic → Set of ConnectionIds
    subscriptions: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    config: HubConfig,
}

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent pub/sub connections
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Handle for sending messages to a specific connection
struct ConnectionHandle {
    sender: mpsc::UnboundedSender<ServerMessage>,
    subscriptions: HashSet<String>,
}

/// Delivery counts for one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new connection
    ///
    /// Returns the connection ID, or an error once the connection limit
    /// has been reached.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                subscriptions: HashSet::new(),
            },
        );

        tracing::info!(connection_id = %id, "Pub/sub connection registered");
        Ok(id)
    }

    /// Unregister a connection and drop its subscriptions
    pub async fn unregister(&self, id: &str) {
        let handle = self.connections.write().await.remove(id);

        if let Some(handle) = handle {
            let mut subs = self.subscriptions.write().await;
            for topic in handle.subscriptions {
                if let Some(subscribers) = subs.get_mut(&topic) {
                    subscribers.remove(id);
                    if subscribers.is_empty() {
                        subs.remove(&topic);
                    }
                }
            }
            tracing::info!(connection_id = %id, "Pub/sub connection unregistered");
        }
    }

    /// Subscribe a connection to topics, returning the ones accepted
    pub async fn subscribe(
        &self,
        id: &str,
        topics: Vec<String>,
    ) -> Result<Vec<String>, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        let mut subs = self.subscriptions.write().await;
        let mut subscribed = Vec::new();

        for topic in topics {
            if !is_valid_topic(&topic) {
                tracing::warn!(topic = %topic, "Invalid topic ignored");
                continue;
            }

            handle.subscriptions.insert(topic.clone());
            subs.entry(topic.clone()).or_default().insert(id.to_string());
            subscribed.push(topic);
        }

        tracing::debug!(connection_id = %id, topics = ?subscribed, "Subscribed to topics");
        Ok(subscribed)
    }

    /// Unsubscribe a connection from topics, returning the ones removed
    pub async fn unsubscribe(
        &self,
        id: &str,
        topics: Vec<String>,
    ) -> Result<Vec<String>, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        let mut subs = self.subscriptions.write().await;
        let mut unsubscribed = Vec::new();

        for topic in topics {
            if handle.subscriptions.remove(&topic) {
                if let Some(subscribers) = subs.get_mut(&topic) {
                    subscribers.remove(id);
                    if subscribers.is_empty() {
                        subs.remove(&topic);
                    }
                }
                unsubscribed.push(topic);
            }
        }

        tracing::debug!(connection_id = %id, topics = ?unsubscribed, "Unsubscribed from topics");
        Ok(unsubscribed)
    }

    /// Deliver an event to every subscriber of its topic
    ///
    /// A subscriber whose channel is closed counts as a failed delivery;
    /// the others still receive the event.
    pub async fn publish(&self, event: WsEvent) -> PublishReport {
        let subscriber_ids = match self.subscriptions.read().await.get(&event.topic) {
            Some(ids) => ids.clone(),
            None => return PublishReport::default(),
        };

        let connections = self.connections.read().await;
        let mut report = PublishReport::default();

        for id in &subscriber_ids {
            let Some(handle) = connections.get(id) else {
                continue;
            };
            if handle.sender.send(event.message.clone()).is_ok() {
                report.delivered += 1;
            } else {
                report.failed += 1;
                tracing::debug!(connection_id = %id, topic = %event.topic, "Subscriber gone, skipping");
            }
        }

        tracing::trace!(
            topic = %event.topic,
            delivered = report.delivered,
            failed = report.failed,
            "Published event"
        );
        report
    }

    /// Send a message directly to a specific connection
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        let handle = connections.get(id).ok_or(HubError::ConnectionNotFound)?;

        handle
            .sender
            .send(message)
            .map_err(|_| HubError::SendFailed)
    }

    /// Current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Subscriber count for a topic
    pub async fn subscription_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Topics a client may subscribe to
fn is_valid_topic(topic: &str) -> bool {
    topic == WATER_DATA_TOPIC || topic == SYSTEM_TOPIC
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Mode, Reading};
    use std::sync::Arc;

    fn water() -> Vec<String> {
        vec![WATER_DATA_TOPIC.to_string()]
    }

    #[test]
    fn test_valid_topics() {
        assert!(is_valid_topic("water_data"));
        assert!(is_valid_topic("system"));
        assert!(!is_valid_topic("metrics.mood"));
        assert!(!is_valid_topic(""));
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let hub = BroadcastHub::default();
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = hub.register(tx).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(hub.connection_count().await, 1);

        hub.unregister(&id).await;
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe() {
        let hub = BroadcastHub::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        let subscribed = hub
            .subscribe(&id, vec!["water_data".into(), "bogus".into()])
            .await
            .unwrap();
        assert_eq!(subscribed, water());
        assert_eq!(hub.subscription_count(WATER_DATA_TOPIC).await, 1);

        let unsubscribed = hub.unsubscribe(&id, water()).await.unwrap();
        assert_eq!(unsubscribed, water());
        assert_eq!(hub.subscription_count(WATER_DATA_TOPIC).await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_connection() {
        let hub = BroadcastHub::default();
        let result = hub.subscribe("missing", water()).await;
        assert!(matches!(result, Err(HubError::ConnectionNotFound)));
    }

    #[tokio::test]
    async fn test_unregister_clears_subscriptions() {
        let hub = BroadcastHub::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();
        hub.subscribe(&id, water()).await.unwrap();

        hub.unregister(&id).await;
        assert_eq!(hub.subscription_count(WATER_DATA_TOPIC).await, 0);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = BroadcastHub::new(HubConfig { max_connections: 2 });

        let (tx1, _) = mpsc::unbounded_channel();
        let (tx2, _) = mpsc::unbounded_channel();
        let (tx3, _) = mpsc::unbounded_channel();

        hub.register(tx1).await.unwrap();
        hub.register(tx2).await.unwrap();
        let result = hub.register(tx3).await;

        assert!(matches!(result, Err(HubError::TooManyConnections(2))));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = BroadcastHub::default();
        let report = hub.publish(WsEvent::reading(Reading::default())).await;
        assert_eq!(report, PublishReport::default());
    }

    #[tokio::test]
    async fn test_publish_only_reaches_topic_subscribers() {
        let hub = BroadcastHub::default();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let id1 = hub.register(tx1).await.unwrap();
        let id2 = hub.register(tx2).await.unwrap();

        hub.subscribe(&id1, water()).await.unwrap();
        hub.subscribe(&id2, vec![SYSTEM_TOPIC.to_string()]).await.unwrap();

        let reading = Reading::new(1.0, 2.0, 3.0);
        let report = hub.publish(WsEvent::reading(reading)).await;
        assert_eq!(report.delivered, 1);

        assert_eq!(rx1.try_recv().unwrap(), WsEvent::reading(reading).message);
        assert!(rx2.try_recv().is_err());

        hub.publish(WsEvent::mode_changed(Mode::Real)).await;
        assert!(rx2.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_subscriber_does_not_block_others() {
        let hub = BroadcastHub::default();

        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        let dead = hub.register(dead_tx).await.unwrap();
        let live = hub.register(live_tx).await.unwrap();
        hub.subscribe(&dead, water()).await.unwrap();
        hub.subscribe(&live, water()).await.unwrap();

        drop(dead_rx);

        let report = hub.publish(WsEvent::reading(Reading::default())).await;
        assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
        assert!(live_rx.try_recv().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_and_publish() {
        let hub = Arc::new(BroadcastHub::default());

        let publisher = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for _ in 0..200 {
                    hub.publish(WsEvent::reading(Reading::default())).await;
                }
            })
        };

        let mut subscribers = Vec::new();
        for _ in 0..16 {
            let hub = Arc::clone(&hub);
            subscribers.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                let id = hub.register(tx).await.unwrap();
                hub.subscribe(&id, water()).await.unwrap();
                tokio::task::yield_now().await;
                hub.unregister(&id).await;
            }));
        }

        publisher.await.unwrap();
        for s in subscribers {
            s.await.unwrap();
        }
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.subscription_count(WATER_DATA_TOPIC).await, 0);
    }
}
