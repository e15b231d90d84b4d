//! Imzo Bot - a Telegram bridge to the Imzo AI question backend.
//!
//! Users log in with a phone number and password, then ask free-text
//! questions. The backend either answers right away or defers the answer to
//! a job that the bot polls until it is ready or a deadline passes.
//!
//! # Architecture
//!
//! - **Backend** ([`backend`]) - Typed client for login, submit and fetch
//! - **Session** ([`session`]) - Per-chat login state
//! - **Conversation** ([`conversation`]) - Login handshake and question handling
//! - **Poller** ([`poller`]) - Background polling for deferred answers
//! - **Message Bus** ([`bus`]) - Queues between channels and the dispatcher
//! - **Channels** ([`channels`]) - Telegram and console integrations
//! - **Gateway** ([`gateway`]) - Wires everything and runs the dispatch loop
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use imzo_bot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = GatewayConfig::new(BotConfig::from_env()?);
//!     Gateway::from_config(config)?.run().await
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` - Enable the Telegram channel via teloxide (default)

pub mod backend;
pub mod bus;
pub mod channel;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod gateway;
pub mod poller;
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{
        BackendError, BackendResult, BotError, BusError, BusResult, ChannelError, ChannelResult,
        ConfigError, ConfigResult, Result, TransportError,
    };

    pub use crate::backend::{Backend, ImzoClient, JobId, SubmitOutcome};

    pub use crate::bus::{BusStats, InboundHandle, MessageBus, OutboundHandle};

    pub use crate::channel::{Channel, ChannelBase, ChannelManager, ChannelState, ChannelStatus};
    pub use crate::channels::ConsoleChannel;
    #[cfg(feature = "telegram")]
    pub use crate::channels::TelegramChannel;

    pub use crate::config::{BackendConfig, BotConfig, PollConfig};

    pub use crate::conversation::{ConversationHandler, Effect, Step, dispatch};

    pub use crate::events::{ChatAddress, InboundMessage, MessageFormat, OutboundMessage};

    pub use crate::gateway::{Gateway, GatewayConfig, GatewayStatus};

    pub use crate::poller::{PendingQuestion, PollOutcome, PollerRegistry, ResponsePoller};

    pub use crate::session::{ConversationState, Session, SessionStore};
}
