//! Unified error types for imzo-bot.
//!
//! Every concern has its own error enum; all of them convert into
//! [`BotError`], which is what the gateway and the binary deal with.

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for imzo-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Message bus error.
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// Channel error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Question backend error.
    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }
}

/// Result type alias for imzo-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Backend Errors
// ============================================================================

/// Error type for calls to the question backend.
///
/// A rejected question is not an error: it is reported as
/// [`SubmitOutcome::Rejected`](crate::backend::SubmitOutcome::Rejected).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Credentials were refused or the login response carried no token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network, HTTP status or decoding failure.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

impl BackendError {
    /// Create an authentication error.
    #[inline]
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Whether this error came from the transport layer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Low level failure talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a status the caller does not handle.
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),

    /// The body was not the JSON we expected.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    /// Well-formed JSON that violates the endpoint contract.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

// ============================================================================
// Message Bus Errors
// ============================================================================

/// Error type for message bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Failed to send inbound message.
    #[error("inbound channel closed")]
    InboundClosed,

    /// No channel is subscribed for the outbound message.
    #[error("no subscriber for channel: {0}")]
    NoSubscriber(String),
}

/// Result type for message bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the channel.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Failed to send message.
    #[error("send failed: {0}")]
    SendFailed(String),
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Missing required variable.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing field error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
