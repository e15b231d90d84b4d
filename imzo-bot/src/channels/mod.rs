//! [`Channel`](crate::channel::Channel) implementations.
//!
//! - [`ConsoleChannel`] reads stdin as one chat (always available)
//! - [`TelegramChannel`] is the Telegram bot (requires the `telegram` feature)

pub mod console;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use console::ConsoleChannel;

#[cfg(feature = "telegram")]
pub use telegram::TelegramChannel;
