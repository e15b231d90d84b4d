//! Gateway service for running the complete bot.
//!
//! The gateway wires together:
//! - the message bus
//! - the channel manager (Telegram, console)
//! - the conversation handler with its session store and pollers
//!
//! and runs the single dispatch loop that feeds inbound messages to the
//! handler in arrival order.

use crate::backend::{Backend, ImzoClient};
use crate::bus::MessageBus;
use crate::channel::{ChannelManager, ChannelStatus};
use crate::channels::ConsoleChannel;
use crate::config::BotConfig;
use crate::conversation::ConversationHandler;
use crate::error::{BotError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[cfg(feature = "telegram")]
use crate::channels::TelegramChannel;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bot configuration.
    pub bot: BotConfig,
    /// Run the Telegram channel.
    pub enable_telegram: bool,
    /// Run the console channel.
    pub enable_console: bool,
}

impl GatewayConfig {
    /// Telegram only, the production setup.
    #[must_use]
    pub const fn new(bot: BotConfig) -> Self {
        Self {
            bot,
            enable_telegram: cfg!(feature = "telegram"),
            enable_console: false,
        }
    }

    /// Enable or disable the Telegram channel.
    #[must_use]
    pub const fn telegram(mut self, enable: bool) -> Self {
        self.enable_telegram = enable;
        self
    }

    /// Enable or disable the console channel.
    #[must_use]
    pub const fn console(mut self, enable: bool) -> Self {
        self.enable_console = enable;
        self
    }
}

/// Runs the bot until shut down.
pub struct Gateway {
    config: GatewayConfig,
    bus: MessageBus,
    channel_manager: ChannelManager,
    handler: ConversationHandler,
    shutdown: CancellationToken,
    running: Arc<RwLock<bool>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway talking to the HTTP backend from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let backend = ImzoClient::new(config.bot.backend.clone())?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Create a gateway around any [`Backend`].
    pub fn with_backend(config: GatewayConfig, backend: Arc<dyn Backend>) -> Self {
        let bus = MessageBus::new();
        let handler = ConversationHandler::new(
            backend,
            bus.outbound_handle(),
            config.bot.backend.chat_room_id.clone(),
            &config.bot.poll,
        );
        Self {
            channel_manager: ChannelManager::new(bus.clone()),
            bus,
            handler,
            config,
            shutdown: CancellationToken::new(),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// The message bus.
    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// The conversation handler.
    #[must_use]
    pub const fn handler(&self) -> &ConversationHandler {
        &self.handler
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ask the gateway to stop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    async fn setup_channels(&self) -> Result<()> {
        if self.config.enable_console {
            self.channel_manager.register(ConsoleChannel::new()).await;
        }

        #[cfg(feature = "telegram")]
        if self.config.enable_telegram {
            let token = self.config.bot.require_telegram_token()?;
            self.channel_manager
                .register(TelegramChannel::new(token))
                .await;
        }

        if self.channel_manager.channel_count().await == 0 {
            return Err(BotError::config("no channel enabled"));
        }
        Ok(())
    }

    /// Start the channels, dispatch until shutdown, then clean up.
    ///
    /// Pending pollers are cancelled on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error if no channel is enabled or none could be started.
    pub async fn run(&self) -> Result<()> {
        self.setup_channels().await?;
        let started = self.channel_manager.start_all().await?;
        *self.running.write().await = true;
        info!(channels = started, "gateway started, press Ctrl+C to stop");

        self.serve().await;

        info!("gateway stopping");
        self.handler.pollers().shutdown().await;
        self.channel_manager.stop_all().await;
        *self.running.write().await = false;

        let status = self.status().await;
        info!(
            inbound = status.total_inbound,
            outbound = status.total_outbound,
            sessions = status.sessions,
            "gateway stopped"
        );
        Ok(())
    }

    /// The dispatch loop.
    ///
    /// Each message is handled completely before the next one is taken, so
    /// a chat's messages are processed in arrival order. Pollers run on
    /// their own tasks and are not serialised against later messages.
    pub async fn serve(&self) {
        loop {
            let msg = tokio::select! {
                () = self.shutdown.cancelled() => break,
                msg = self.bus.consume_inbound() => msg,
            };
            let Some(msg) = msg else {
                debug!("inbound queue closed");
                break;
            };
            debug!(chat = %msg.address, "dispatching message");
            self.handler.handle(&msg).await;
        }
    }

    /// Whether [`run`](Self::run) is between startup and shutdown.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Snapshot of channels, traffic and conversations.
    pub async fn status(&self) -> GatewayStatus {
        let bus_stats = self.bus.stats().await;
        GatewayStatus {
            running: *self.running.read().await,
            channels: self.channel_manager.status_all().await,
            total_inbound: bus_stats.inbound_count,
            total_outbound: bus_stats.outbound_count,
            sessions: self.handler.sessions().len().await,
            active_pollers: self.handler.pollers().active().await,
        }
    }
}

/// Gateway status information.
#[derive(Debug, Clone)]
pub struct GatewayStatus {
    /// Whether the gateway is running.
    pub running: bool,
    /// Channel statuses.
    pub channels: Vec<ChannelStatus>,
    /// Inbound messages received.
    pub total_inbound: u64,
    /// Outbound messages delivered.
    pub total_outbound: u64,
    /// Known chats.
    pub sessions: usize,
    /// Pollers still waiting for an answer.
    pub active_pollers: usize,
}
