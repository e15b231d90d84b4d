//! Ownership and cancellation of running pollers.

use super::task::{PendingQuestion, PollOutcome, ResponsePoller};
use crate::backend::JobId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Registry {
    /// Cancellation scope per session key.
    chats: HashMap<String, CancellationToken>,
    /// Jobs with a live poller.
    active_jobs: HashSet<JobId>,
}

/// Spawns pollers and keeps their cancellation scopes.
///
/// Every poller runs under a per-chat token, itself a child of a root token
/// for the whole process. Cancelling a chat stops that chat's pollers only;
/// [`shutdown`](Self::shutdown) stops all of them.
///
/// A chat's pollers are not ordered against its later submissions: a newer
/// question can be answered before an older deferred one.
#[derive(Debug, Clone)]
pub struct PollerRegistry {
    poller: Arc<ResponsePoller>,
    root: CancellationToken,
    tracker: TaskTracker,
    inner: Arc<RwLock<Registry>>,
}

impl PollerRegistry {
    /// Create an empty registry around `poller`.
    pub fn new(poller: ResponsePoller) -> Self {
        Self {
            poller: Arc::new(poller),
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
            inner: Arc::new(RwLock::new(Registry::default())),
        }
    }

    /// Start polling for `question`.
    ///
    /// Returns `None` if a poller for the same job is already running or the
    /// registry has been shut down.
    pub async fn spawn(&self, question: PendingQuestion) -> Option<JoinHandle<PollOutcome>> {
        if self.root.is_cancelled() {
            warn!(job_id = %question.job_id, "poller registry is shut down");
            return None;
        }

        let key = question.address.session_key();
        let job_id = question.job_id.clone();
        let cancel = {
            let mut inner = self.inner.write().await;
            if !inner.active_jobs.insert(job_id.clone()) {
                warn!(job_id = %job_id, "poller already running for job");
                return None;
            }
            inner
                .chats
                .entry(key.clone())
                .or_insert_with(|| self.root.child_token())
                .child_token()
        };

        debug!(job_id = %job_id, chat = %key, "spawning poller");
        let poller = Arc::clone(&self.poller);
        let inner = Arc::clone(&self.inner);
        Some(self.tracker.spawn(async move {
            let outcome = poller.run(question, cancel).await;
            inner.write().await.active_jobs.remove(&job_id);
            outcome
        }))
    }

    /// Cancel every poller of the chat with session key `key`.
    pub async fn cancel_chat(&self, key: &str) {
        if let Some(token) = self.inner.write().await.chats.remove(key) {
            debug!(chat = %key, "cancelling pollers");
            token.cancel();
        }
    }

    /// Number of pollers still running.
    pub async fn active(&self) -> usize {
        self.inner.read().await.active_jobs.len()
    }

    /// Whether a poller is running for `job_id`.
    pub async fn is_polling(&self, job_id: &JobId) -> bool {
        self.inner.read().await.active_jobs.contains(job_id)
    }

    /// Cancel all pollers and wait for them to finish.
    pub async fn shutdown(&self) {
        info!(active = self.tracker.len(), "stopping pollers");
        self.root.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
