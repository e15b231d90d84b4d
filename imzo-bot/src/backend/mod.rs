//! Client side of the question backend.
//!
//! The backend exposes three calls: login, submit a question, and fetch the
//! final answer of a deferred job. The [`Backend`] trait is the seam the
//! conversation core and the pollers talk to; [`ImzoClient`] is the HTTP
//! implementation.

mod client;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use client::ImzoClient;

use crate::error::BackendResult;
use async_trait::async_trait;
use std::fmt;

/// Opaque backend-issued handle of a deferred answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Wrap a job id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of submitting a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend declined the question; `message` is meant for the user.
    Rejected {
        /// Rejection text, possibly empty.
        message: String,
    },
    /// An answer came back right away.
    Answered {
        /// The immediate answer, never empty.
        answer: String,
        /// A richer answer may still follow for this job.
        job_id: Option<JobId>,
    },
    /// Nothing yet; the answer has to be polled for.
    Deferred {
        /// Job to poll.
        job_id: JobId,
    },
}

impl SubmitOutcome {
    /// The job a poller should follow, if any.
    #[must_use]
    pub const fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Rejected { .. } => None,
            Self::Answered { job_id, .. } => job_id.as_ref(),
            Self::Deferred { job_id } => Some(job_id),
        }
    }
}

/// Operations the bot needs from the question backend.
///
/// Every call is a single HTTP round trip bounded by the client timeout.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Exchange credentials for an auth token.
    ///
    /// Fails with [`BackendError::Auth`](crate::error::BackendError::Auth)
    /// when the credentials are refused or no token is returned.
    async fn authenticate(&self, login: &str, password: &str) -> BackendResult<String>;

    /// Submit a question to a chat room.
    async fn submit_question(
        &self,
        token: &str,
        room_id: &str,
        question: &str,
    ) -> BackendResult<SubmitOutcome>;

    /// Fetch the final answer of a job; `None` while it is not ready.
    ///
    /// Errors are transient from the caller's point of view.
    async fn fetch_final(&self, token: &str, job_id: &JobId) -> BackendResult<Option<String>>;
}
