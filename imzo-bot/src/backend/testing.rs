//! In-memory [`Backend`] with scripted answers, for tests.

use super::{Backend, JobId, SubmitOutcome};
use crate::error::{BackendError, BackendResult, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One scripted reply.
#[derive(Debug, Clone)]
pub(crate) enum Scripted<T> {
    Ok(T),
    Auth,
    Transport,
}

impl<T> Scripted<T> {
    fn into_result(self) -> BackendResult<T> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Auth => Err(BackendError::auth("scripted auth failure")),
            Self::Transport => Err(TransportError::Malformed("scripted failure".into()).into()),
        }
    }
}

/// A submit call as the backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubmitCall {
    pub token: String,
    pub room_id: String,
    pub question: String,
}

/// Backend whose replies are queued up front.
///
/// Unknown credentials fail authentication, an empty submit queue fails with
/// a transport error and an exhausted fetch queue reports "not ready".
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    credentials: Mutex<HashMap<(String, String), String>>,
    login_overrides: Mutex<VecDeque<Scripted<String>>>,
    submits: Mutex<VecDeque<Scripted<SubmitOutcome>>>,
    finals: Mutex<HashMap<JobId, VecDeque<Scripted<Option<String>>>>>,
    submit_calls: Mutex<Vec<SubmitCall>>,
    fetch_calls: Mutex<HashMap<JobId, usize>>,
    fetch_tokens: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(self, login: &str, password: &str, token: &str) -> Self {
        self.credentials.lock().unwrap().insert(
            (login.to_string(), password.to_string()),
            token.to_string(),
        );
        self
    }

    /// The next login attempt gets this reply regardless of credentials.
    pub fn push_login(&self, reply: Scripted<String>) {
        self.login_overrides.lock().unwrap().push_back(reply);
    }

    pub fn push_submit(&self, reply: Scripted<SubmitOutcome>) {
        self.submits.lock().unwrap().push_back(reply);
    }

    pub fn push_final(&self, job_id: &str, reply: Scripted<Option<String>>) {
        self.finals
            .lock()
            .unwrap()
            .entry(JobId::new(job_id))
            .or_default()
            .push_back(reply);
    }

    pub fn submit_calls(&self) -> Vec<SubmitCall> {
        self.submit_calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, job_id: &str) -> usize {
        self.fetch_calls
            .lock()
            .unwrap()
            .get(&JobId::new(job_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn fetch_tokens(&self) -> Vec<String> {
        self.fetch_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn authenticate(&self, login: &str, password: &str) -> BackendResult<String> {
        if let Some(reply) = self.login_overrides.lock().unwrap().pop_front() {
            return reply.into_result();
        }
        self.credentials
            .lock()
            .unwrap()
            .get(&(login.to_string(), password.to_string()))
            .cloned()
            .ok_or_else(|| BackendError::auth("unexpected status: 401 Unauthorized"))
    }

    async fn submit_question(
        &self,
        token: &str,
        room_id: &str,
        question: &str,
    ) -> BackendResult<SubmitOutcome> {
        self.submit_calls.lock().unwrap().push(SubmitCall {
            token: token.to_string(),
            room_id: room_id.to_string(),
            question: question.to_string(),
        });
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Transport)
            .into_result()
    }

    async fn fetch_final(&self, token: &str, job_id: &JobId) -> BackendResult<Option<String>> {
        *self
            .fetch_calls
            .lock()
            .unwrap()
            .entry(job_id.clone())
            .or_default() += 1;
        self.fetch_tokens.lock().unwrap().push(token.to_string());
        self.finals
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Scripted::Ok(None))
            .into_result()
    }
}
