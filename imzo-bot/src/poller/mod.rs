//! Background pollers for deferred answers.
//!
//! When the backend defers an answer, the conversation handler hands a
//! [`PendingQuestion`] to the [`PollerRegistry`], which runs a
//! [`ResponsePoller`] loop for it on its own task. A poller ends in exactly
//! one [`PollOutcome`].

mod registry;
mod task;

pub use registry::PollerRegistry;
pub use task::{PendingQuestion, PollOutcome, ResponsePoller};
