//! Async message bus between chat channels and the dispatcher.
//!
//! Inbound traffic is a single queue consumed by the dispatch loop, so
//! messages are handled strictly in arrival order. Outbound traffic is routed
//! to the subscribers of the message's channel.

use crate::error::{BusError, BusResult};
use crate::events::{InboundMessage, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, trace};

/// Default capacity for message queues.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Async message bus that decouples chat channels from the conversation core.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

struct MessageBusInner {
    /// Inbound message queue (channels → dispatcher).
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: RwLock<mpsc::Receiver<InboundMessage>>,

    /// Channel-specific subscribers for outbound delivery.
    channel_subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<OutboundMessage>>>>,

    capacity: usize,
    stats: RwLock<BusStats>,
}

/// Message bus statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Total inbound messages published.
    pub inbound_count: u64,
    /// Total outbound messages delivered to at least one subscriber.
    pub outbound_count: u64,
    /// Outbound messages nobody was subscribed for.
    pub dropped_count: u64,
}

impl MessageBus {
    /// Create a new message bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a new message bus with specified queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);

        Self {
            inner: Arc::new(MessageBusInner {
                inbound_tx,
                inbound_rx: RwLock::new(inbound_rx),
                channel_subscribers: RwLock::new(HashMap::new()),
                capacity,
                stats: RwLock::new(BusStats::default()),
            }),
        }
    }

    /// Publish an inbound message from a channel.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> BusResult<()> {
        trace!(chat = %msg.address, sender = %msg.sender_id, "publishing inbound message");

        self.inner
            .inbound_tx
            .send(msg)
            .await
            .map_err(|_| BusError::InboundClosed)?;

        self.inner.stats.write().await.inbound_count += 1;
        Ok(())
    }

    /// Consume the next inbound message.
    ///
    /// Only the dispatch loop calls this. Returns `None` once every sender
    /// is gone.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inner.inbound_rx.write().await.recv().await
    }

    /// Publish an outbound message to the subscribers of its channel.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSubscriber`] when no live subscriber exists for
    /// the target channel; the message is dropped.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> BusResult<()> {
        trace!(chat = %msg.address, "publishing outbound message");

        let senders = self
            .inner
            .channel_subscribers
            .read()
            .await
            .get(&msg.address.channel)
            .cloned()
            .unwrap_or_default();

        let mut delivered = false;
        for sender in &senders {
            if sender.send(msg.clone()).await.is_ok() {
                delivered = true;
            } else {
                debug!(channel = %msg.address.channel, "channel subscriber disconnected");
            }
        }

        let mut stats = self.inner.stats.write().await;
        if delivered {
            stats.outbound_count += 1;
            Ok(())
        } else {
            stats.dropped_count += 1;
            Err(BusError::NoSubscriber(msg.address.channel))
        }
    }

    /// Subscribe to outbound messages for a specific channel.
    pub async fn subscribe_channel(&self, channel: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);

        let mut subscribers = self.inner.channel_subscribers.write().await;
        let entry = subscribers.entry(channel.to_string()).or_default();
        entry.retain(|s| !s.is_closed());
        entry.push(tx);

        debug!(channel = %channel, "new channel subscriber registered");
        rx
    }

    /// Get current bus statistics.
    pub async fn stats(&self) -> BusStats {
        *self.inner.stats.read().await
    }

    /// Create a handle for publishing inbound messages.
    pub fn inbound_handle(&self) -> InboundHandle {
        InboundHandle {
            tx: self.inner.inbound_tx.clone(),
        }
    }

    /// Create a handle for publishing outbound messages.
    pub fn outbound_handle(&self) -> OutboundHandle {
        OutboundHandle { bus: self.clone() }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight handle for publishing inbound messages.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    tx: mpsc::Sender<InboundMessage>,
}

impl InboundHandle {
    /// Publish an inbound message.
    pub async fn publish(&self, msg: InboundMessage) -> BusResult<()> {
        self.tx.send(msg).await.map_err(|_| BusError::InboundClosed)
    }
}

/// Lightweight handle for publishing outbound messages.
///
/// This is the "deliver text to a chat" capability handed to the
/// conversation handler and to every poller.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    bus: MessageBus,
}

impl OutboundHandle {
    /// Publish an outbound message.
    pub async fn publish(&self, msg: OutboundMessage) -> BusResult<()> {
        self.bus.publish_outbound(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChatAddress;
    use std::time::Duration;

    #[tokio::test]
    async fn test_inbound_message_flow() {
        let bus = MessageBus::new();

        bus.inbound_handle()
            .publish(InboundMessage::new("test", "sender1", "chat1", "first"))
            .await
            .unwrap();
        bus.publish_inbound(InboundMessage::new("test", "sender1", "chat1", "second"))
            .await
            .unwrap();

        assert_eq!(bus.consume_inbound().await.unwrap().content, "first");
        assert_eq!(bus.consume_inbound().await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_channel_subscription() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe_channel("telegram").await;
        let _console = bus.subscribe_channel("console").await;

        let msg1 = OutboundMessage::new(ChatAddress::new("telegram", "1"), "For Telegram");
        bus.publish_outbound(msg1).await.unwrap();

        let msg2 = OutboundMessage::new(ChatAddress::new("console", "2"), "For console");
        bus.outbound_handle().publish(msg2).await.unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.content, "For Telegram");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_outbound_without_subscriber_is_dropped() {
        let bus = MessageBus::new();

        let msg = OutboundMessage::new(ChatAddress::new("nowhere", "1"), "lost");
        let err = bus.publish_outbound(msg).await.unwrap_err();
        assert!(matches!(err, BusError::NoSubscriber(ref c) if c == "nowhere"));

        let rx = bus.subscribe_channel("gone").await;
        drop(rx);
        let msg = OutboundMessage::new(ChatAddress::new("gone", "1"), "lost too");
        assert!(bus.publish_outbound(msg).await.is_err());

        let stats = bus.stats().await;
        assert_eq!(stats.dropped_count, 2);
        assert_eq!(stats.outbound_count, 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MessageBus::new();
        let _rx = bus.subscribe_channel("test").await;

        bus.publish_inbound(InboundMessage::new("test", "s", "c", "in"))
            .await
            .unwrap();
        bus.publish_outbound(OutboundMessage::new(ChatAddress::new("test", "c"), "out"))
            .await
            .unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.inbound_count, 1);
        assert_eq!(stats.outbound_count, 1);
    }
}
