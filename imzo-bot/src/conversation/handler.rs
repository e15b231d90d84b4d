//! Executes the effects chosen by [`dispatch`].

use super::machine::{Effect, dispatch};
use super::replies;
use crate::backend::{Backend, JobId, SubmitOutcome};
use crate::bus::OutboundHandle;
use crate::config::PollConfig;
use crate::error::BackendError;
use crate::events::{InboundMessage, OutboundMessage};
use crate::poller::{PendingQuestion, PollerRegistry, ResponsePoller};
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handles inbound messages one at a time.
///
/// Session changes happen inside a single [`SessionStore::mutate`] call;
/// backend calls are made after the lock is released.
pub struct ConversationHandler {
    backend: Arc<dyn Backend>,
    sessions: Arc<SessionStore>,
    pollers: PollerRegistry,
    outbound: OutboundHandle,
    room_id: String,
    poll_timeout: Duration,
}

impl std::fmt::Debug for ConversationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHandler")
            .field("room_id", &self.room_id)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl ConversationHandler {
    /// Create a handler submitting questions to `room_id`.
    pub fn new(
        backend: Arc<dyn Backend>,
        outbound: OutboundHandle,
        room_id: impl Into<String>,
        poll: &PollConfig,
    ) -> Self {
        let poller = ResponsePoller::new(Arc::clone(&backend), outbound.clone(), poll.interval);
        Self {
            backend,
            sessions: Arc::new(SessionStore::new()),
            pollers: PollerRegistry::new(poller),
            outbound,
            room_id: room_id.into(),
            poll_timeout: poll.timeout,
        }
    }

    /// The session store.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The poller registry.
    #[must_use]
    pub const fn pollers(&self) -> &PollerRegistry {
        &self.pollers
    }

    /// Handle one inbound message. Failures are reported to the chat and
    /// logged, never returned.
    pub async fn handle(&self, msg: &InboundMessage) {
        let text = msg.content.trim();
        if text.is_empty() {
            debug!(chat = %msg.address, "ignoring empty message");
            return;
        }

        let key = msg.session_key();
        let step = self.sessions.mutate(&key, |session| dispatch(session, text)).await;
        if step.reset {
            self.pollers.cancel_chat(&key).await;
        }

        match step.effect {
            Effect::Reply(reply) => self.reply(msg, reply.text()).await,
            Effect::Authenticate { login, password } => {
                self.login(msg, &key, &login, &password).await;
            }
            Effect::Submit { token, question } => self.submit(msg, token, &question).await,
        }
    }

    async fn login(&self, msg: &InboundMessage, key: &str, login: &str, password: &str) {
        let failure = match self.backend.authenticate(login, password).await {
            Ok(token) => {
                if self.sessions.mutate(key, |s| s.authenticate(token)).await {
                    info!(chat = %msg.address, "login succeeded");
                    self.reply(msg, replies::LOGIN_SUCCESS).await;
                    return;
                }
                replies::login_failed("token olinmadi")
            }
            Err(BackendError::Auth(reason)) => {
                info!(chat = %msg.address, reason = %reason, "login refused");
                replies::login_failed(&reason)
            }
            Err(e) => {
                warn!(chat = %msg.address, error = %e, "login request failed");
                replies::LOGIN_UNAVAILABLE.to_string()
            }
        };

        self.sessions.mutate(key, |s| s.reset()).await;
        self.pollers.cancel_chat(key).await;
        self.reply(msg, &failure).await;
    }

    async fn submit(&self, msg: &InboundMessage, token: String, question: &str) {
        let outcome = match self
            .backend
            .submit_question(&token, &self.room_id, question)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(chat = %msg.address, error = %e, "submit failed");
                self.reply(msg, replies::SUBMIT_FAILED).await;
                return;
            }
        };

        match outcome {
            SubmitOutcome::Rejected { message } => {
                debug!(chat = %msg.address, "question rejected");
                self.reply(msg, &replies::rejection(&message)).await;
            }
            SubmitOutcome::Answered { answer, job_id } => {
                self.reply(msg, &answer).await;
                if let Some(job_id) = job_id {
                    self.poll(msg, job_id, token).await;
                }
            }
            SubmitOutcome::Deferred { job_id } => self.poll(msg, job_id, token).await,
        }
    }

    async fn poll(&self, msg: &InboundMessage, job_id: JobId, token: String) {
        let question = PendingQuestion::new(msg.address.clone(), job_id, token, self.poll_timeout);
        // The registry tracks the task; the join handle is not needed here.
        if self.pollers.spawn(question).await.is_none() {
            debug!(chat = %msg.address, "poller not started");
        }
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        if let Err(e) = self.outbound.publish(OutboundMessage::reply_to(msg, text)).await {
            warn!(chat = %msg.address, error = %e, "failed to publish reply");
        }
    }
}
