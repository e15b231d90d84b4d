//! The conversation core: login handshake and question handling.
//!
//! [`dispatch`] is the pure transition function over a
//! [`Session`](crate::session::Session); [`ConversationHandler`] runs it
//! against the session store and performs the resulting backend calls,
//! replies and poller spawns.

mod handler;
mod machine;
pub mod replies;

pub use handler::ConversationHandler;
pub use machine::{Effect, START_COMMAND, Step, dispatch};
pub use replies::Reply;
