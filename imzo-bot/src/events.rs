//! Message events for channel communication.
//!
//! These are the values that travel over the [`MessageBus`](crate::bus::MessageBus):
//! channels publish [`InboundMessage`]s, the dispatcher and the pollers publish
//! [`OutboundMessage`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Where a conversation lives: a channel name plus the chat id inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatAddress {
    /// Channel identifier (e.g., "telegram", "console").
    pub channel: String,
    /// Chat identifier within the channel.
    pub chat_id: String,
}

impl ChatAddress {
    /// Create a new address.
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Key identifying the conversation across all channels.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }
}

impl fmt::Display for ChatAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.chat_id)
    }
}

/// An inbound text message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Conversation the message belongs to.
    pub address: ChatAddress,
    /// Sender's identifier within the channel.
    pub sender_id: String,
    /// Message text content.
    pub content: String,
    /// Timestamp when the message was received.
    pub timestamp: SystemTime,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            address: ChatAddress::new(channel, chat_id),
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp: SystemTime::now(),
        }
    }

    /// Key of the session this message is handled against.
    #[must_use]
    pub fn session_key(&self) -> String {
        self.address.session_key()
    }
}

/// Message format hint for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Plain text, no formatting.
    #[default]
    Plain,
    /// Markdown formatted text.
    Markdown,
}

/// An outbound message to a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target conversation.
    pub address: ChatAddress,
    /// Message text content.
    pub content: String,
    /// Message format hint for the channel.
    pub format: MessageFormat,
}

impl OutboundMessage {
    /// Create a new plain text message.
    pub fn new(address: ChatAddress, content: impl Into<String>) -> Self {
        Self {
            address,
            content: content.into(),
            format: MessageFormat::default(),
        }
    }

    /// Create a Markdown message addressed to the chat an inbound message came from.
    pub fn reply_to(msg: &InboundMessage, content: impl Into<String>) -> Self {
        Self::new(msg.address.clone(), content).with_format(MessageFormat::Markdown)
    }

    /// Set message format.
    #[must_use]
    pub const fn with_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_message_creation() {
        let msg = InboundMessage::new("telegram", "user123", "chat456", "Hello!");
        assert_eq!(msg.address.channel, "telegram");
        assert_eq!(msg.sender_id, "user123");
        assert_eq!(msg.address.chat_id, "chat456");
        assert_eq!(msg.content, "Hello!");
        assert_eq!(msg.session_key(), "telegram:chat456");
    }

    #[test]
    fn test_outbound_reply() {
        let inbound = InboundMessage::new("telegram", "user123", "chat456", "Hi");
        let outbound = OutboundMessage::reply_to(&inbound, "Hello back!");

        assert_eq!(outbound.address, inbound.address);
        assert_eq!(outbound.format, MessageFormat::Markdown);
        assert_eq!(outbound.address.to_string(), "telegram:chat456");
    }
}
