//! Poll-until-ready loop for one deferred answer.

use crate::backend::{Backend, JobId};
use crate::bus::OutboundHandle;
use crate::events::{ChatAddress, MessageFormat, OutboundMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Used when `now + timeout` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A submitted question whose answer has to be polled for.
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    /// Chat the answer goes to.
    pub address: ChatAddress,
    /// Backend job to poll.
    pub job_id: JobId,
    /// Token of the user at submission time.
    pub auth_token: String,
    /// Polling stops once this instant passes.
    pub deadline: Instant,
}

impl PendingQuestion {
    /// Create a pending question that expires `timeout` from now.
    ///
    /// A timeout too large to represent is clamped to a far-future deadline.
    pub fn new(
        address: ChatAddress,
        job_id: JobId,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self {
            address,
            job_id,
            auth_token: auth_token.into(),
            deadline,
        }
    }
}

/// How a poller ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The answer was fetched and handed to the chat.
    Delivered,
    /// The deadline passed without an answer. Nothing is sent.
    TimedOut,
    /// Stopped from outside.
    Cancelled,
}

enum Tick<T> {
    Cancelled,
    Deadline,
    Done(T),
}

/// Polls the backend for deferred answers and publishes them.
///
/// Stateless apart from its collaborators; one instance serves every
/// [`PendingQuestion`].
pub struct ResponsePoller {
    backend: Arc<dyn Backend>,
    outbound: OutboundHandle,
    interval: Duration,
}

impl std::fmt::Debug for ResponsePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsePoller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ResponsePoller {
    /// Create a poller that fetches every `interval`.
    pub fn new(backend: Arc<dyn Backend>, outbound: OutboundHandle, interval: Duration) -> Self {
        Self {
            backend,
            outbound,
            interval,
        }
    }

    /// Poll until the answer arrives, the deadline passes or `cancel` fires.
    ///
    /// Fetch failures are logged and count as an empty tick.
    pub async fn run(&self, question: PendingQuestion, cancel: CancellationToken) -> PollOutcome {
        let PendingQuestion {
            address,
            job_id,
            auth_token,
            deadline,
        } = question;
        let mut ticks = 0u32;

        loop {
            match guarded(&cancel, deadline, sleep(self.interval)).await {
                Tick::Cancelled => return finish(&job_id, PollOutcome::Cancelled, ticks),
                Tick::Deadline => return finish(&job_id, PollOutcome::TimedOut, ticks),
                Tick::Done(()) => {}
            }

            ticks += 1;
            let fetch = self.backend.fetch_final(&auth_token, &job_id);
            let answer = match guarded(&cancel, deadline, fetch).await {
                Tick::Cancelled => return finish(&job_id, PollOutcome::Cancelled, ticks),
                Tick::Deadline => return finish(&job_id, PollOutcome::TimedOut, ticks),
                Tick::Done(Ok(Some(answer))) => answer,
                Tick::Done(Ok(None)) => {
                    debug!(job_id = %job_id, tick = ticks, "answer not ready");
                    continue;
                }
                Tick::Done(Err(e)) => {
                    warn!(job_id = %job_id, tick = ticks, error = %e, "fetch failed, retrying");
                    continue;
                }
            };

            // A reset may have landed while the fetch was completing.
            if cancel.is_cancelled() {
                return finish(&job_id, PollOutcome::Cancelled, ticks);
            }

            let msg =
                OutboundMessage::new(address.clone(), answer).with_format(MessageFormat::Markdown);
            if let Err(e) = self.outbound.publish(msg).await {
                warn!(job_id = %job_id, chat = %address, error = %e, "failed to publish answer");
            }
            return finish(&job_id, PollOutcome::Delivered, ticks);
        }
    }
}

fn finish(job_id: &JobId, outcome: PollOutcome, ticks: u32) -> PollOutcome {
    info!(job_id = %job_id, ?outcome, ticks, "poller finished");
    outcome
}

/// Run `fut` unless cancellation or the deadline comes first.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    deadline: Instant,
    fut: F,
) -> Tick<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Tick::Cancelled,
        () = sleep_until(deadline) => Tick::Deadline,
        out = fut => Tick::Done(out),
    }
}
