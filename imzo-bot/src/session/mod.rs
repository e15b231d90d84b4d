//! Session tracking for the login handshake.
//!
//! One [`Session`] exists per chat, held by the [`SessionStore`] for the
//! lifetime of the process. Nothing is persisted across restarts.

mod state;
mod store;

pub use state::{ConversationState, Session};
pub use store::SessionStore;
