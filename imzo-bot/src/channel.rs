//! Chat transport abstraction.
//!
//! A [`Channel`] turns platform updates into [`InboundMessage`]s on the bus
//! and delivers the [`OutboundMessage`]s routed to it through its bus
//! subscription. The conversation core never talks to a platform directly.
//!
//! [`InboundMessage`]: crate::events::InboundMessage
//! [`OutboundMessage`]: crate::events::OutboundMessage

use crate::bus::MessageBus;
use crate::error::{ChannelError, ChannelResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Not started.
    #[default]
    Stopped,
    /// Connecting to the platform.
    Starting,
    /// Receiving and delivering messages.
    Running,
    /// Shutting down.
    Stopping,
    /// Failed; see [`ChannelStatus::last_error`].
    Error,
}

/// Snapshot of a channel's health.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Current state.
    pub state: ChannelState,
    /// Text messages published to the bus.
    pub messages_received: u64,
    /// Messages delivered to the platform.
    pub messages_sent: u64,
    /// Last error, if any.
    pub last_error: Option<String>,
}

impl ChannelStatus {
    /// Running without a recorded error.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == ChannelState::Running && self.last_error.is_none()
    }
}

/// A chat platform integration.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique name; also the routing key of outbound messages.
    fn name(&self) -> &str;

    /// Connect and start processing.
    ///
    /// Implementations subscribe to `bus.subscribe_channel(self.name())` for
    /// outbound delivery, publish inbound text through
    /// [`MessageBus::inbound_handle`] and return once their background tasks
    /// are spawned.
    async fn start(&self, bus: &MessageBus) -> ChannelResult<()>;

    /// Stop background tasks.
    async fn stop(&self) -> ChannelResult<()>;

    /// Current status.
    async fn status(&self) -> ChannelStatus;

    /// Whether the channel is running.
    async fn is_running(&self) -> bool {
        self.status().await.state == ChannelState::Running
    }
}

/// Owns the registered channels and their lifecycle.
pub struct ChannelManager {
    channels: RwLock<Vec<Arc<dyn Channel>>>,
    bus: MessageBus,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Create a manager whose channels attach to `bus`.
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Register a channel.
    pub async fn register(&self, channel: impl Channel + 'static) {
        let channel: Arc<dyn Channel> = Arc::new(channel);
        info!(channel = %channel.name(), "channel registered");
        self.channels.write().await.push(channel);
    }

    /// Start every registered channel.
    ///
    /// Individual failures are logged; the call fails only when no channel
    /// could be started.
    pub async fn start_all(&self) -> ChannelResult<usize> {
        let channels = self.channels.read().await;
        let mut started = 0;
        let mut last_error = None;

        for channel in channels.iter() {
            info!(channel = %channel.name(), "starting channel");
            match channel.start(&self.bus).await {
                Ok(()) => started += 1,
                Err(e) => {
                    error!(channel = %channel.name(), error = %e, "failed to start channel");
                    last_error = Some(e);
                }
            }
        }

        match (started, last_error) {
            (0, Some(e)) => Err(e),
            (0, None) => Err(ChannelError::start("no channels registered")),
            (n, _) => Ok(n),
        }
    }

    /// Stop every registered channel, logging failures.
    pub async fn stop_all(&self) {
        for channel in self.channels.read().await.iter() {
            info!(channel = %channel.name(), "stopping channel");
            if let Err(e) = channel.stop().await {
                error!(channel = %channel.name(), error = %e, "failed to stop channel");
            }
        }
    }

    /// Status of every channel.
    pub async fn status_all(&self) -> Vec<ChannelStatus> {
        let channels = self.channels.read().await;
        let mut statuses = Vec::with_capacity(channels.len());
        for channel in channels.iter() {
            statuses.push(channel.status().await);
        }
        statuses
    }

    /// Number of registered channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// State and counters shared by channel implementations.
pub struct ChannelBase {
    name: String,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    messages_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

impl ChannelBase {
    /// Create a stopped base named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    /// Set the state.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Count an inbound message.
    pub async fn record_received(&self) {
        self.stats.write().await.messages_received += 1;
    }

    /// Count a delivered message.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Log and remember an error.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Build a status snapshot.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;
        ChannelStatus {
            name: self.name.clone(),
            state,
            messages_received: stats.messages_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeChannel {
        base: ChannelBase,
        fail: bool,
    }

    #[async_trait]
    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            self.base.name()
        }

        async fn start(&self, _bus: &MessageBus) -> ChannelResult<()> {
            if self.fail {
                return Err(ChannelError::start("boom"));
            }
            self.base.set_state(ChannelState::Running).await;
            Ok(())
        }

        async fn stop(&self) -> ChannelResult<()> {
            self.base.set_state(ChannelState::Stopped).await;
            Ok(())
        }

        async fn status(&self) -> ChannelStatus {
            self.base.build_status().await
        }
    }

    fn fake(name: &str, fail: bool) -> FakeChannel {
        FakeChannel {
            base: ChannelBase::new(name),
            fail,
        }
    }

    #[tokio::test]
    async fn test_channel_base() {
        let base = ChannelBase::new("console");
        assert_eq!(base.name(), "console");
        assert_eq!(base.state().await, ChannelState::Stopped);

        base.set_state(ChannelState::Running).await;
        base.record_received().await;
        base.record_sent().await;

        let status = base.build_status().await;
        assert_eq!(status.messages_received, 1);
        assert_eq!(status.messages_sent, 1);
        assert!(status.is_healthy());

        base.record_error("lost connection").await;
        assert!(!base.build_status().await.is_healthy());
    }

    #[tokio::test]
    async fn test_start_all_tolerates_partial_failure() {
        let manager = ChannelManager::new(MessageBus::new());
        manager.register(fake("good", false)).await;
        manager.register(fake("bad", true)).await;

        assert_eq!(manager.start_all().await.unwrap(), 1);
        let running: Vec<_> = manager
            .status_all()
            .await
            .into_iter()
            .filter(|s| s.state == ChannelState::Running)
            .map(|s| s.name)
            .collect();
        assert_eq!(running, vec!["good".to_string()]);

        manager.stop_all().await;
        assert!(
            manager
                .status_all()
                .await
                .iter()
                .all(|s| s.state == ChannelState::Stopped)
        );
    }

    #[tokio::test]
    async fn test_start_all_fails_without_channels() {
        let manager = ChannelManager::new(MessageBus::new());
        assert!(manager.start_all().await.is_err());

        manager.register(fake("bad", true)).await;
        assert!(manager.start_all().await.is_err());
        assert_eq!(manager.channel_count().await, 1);
    }
}
