//! Per-chat conversation state.

use std::fmt;

/// Where a chat is in the login cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConversationState {
    /// Nothing started yet, or the last login attempt failed.
    #[default]
    Idle,
    /// Waiting for the user's identifier (phone number).
    AwaitingLogin,
    /// Identifier cached, waiting for the secret.
    AwaitingPassword,
    /// Authenticated; every text is a question.
    Ready,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingLogin => "awaiting_login",
            Self::AwaitingPassword => "awaiting_password",
            Self::Ready => "ready",
        })
    }
}

/// Conversation state of one chat.
///
/// Fields are private so that the token can only be set together with the
/// `Ready` state: a session holds a token if and only if it is `Ready`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    state: ConversationState,
    pending_login: Option<String>,
    auth_token: Option<String>,
}

impl Session {
    /// A fresh, idle session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConversationState {
        self.state
    }

    /// Identifier cached while waiting for the secret.
    #[must_use]
    pub fn pending_login(&self) -> Option<&str> {
        self.pending_login.as_deref()
    }

    /// Token issued by the backend; `Some` only while `Ready`.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Whether the session can submit questions.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ConversationState::Ready && self.auth_token.is_some()
    }

    /// Drop everything and go back to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start a new login cycle, discarding any previous credentials.
    pub fn begin_login(&mut self) {
        self.reset();
        self.state = ConversationState::AwaitingLogin;
    }

    /// Cache the identifier and wait for the secret.
    pub fn remember_login(&mut self, login: impl Into<String>) {
        self.pending_login = Some(login.into());
        self.auth_token = None;
        self.state = ConversationState::AwaitingPassword;
    }

    /// Take the cached identifier out; the session keeps waiting for the
    /// outcome of the login call.
    pub fn take_pending_login(&mut self) -> Option<String> {
        self.pending_login.take()
    }

    /// Store a freshly issued token and become `Ready`.
    ///
    /// A blank token resets the session instead. Returns whether the session
    /// is ready afterwards.
    pub fn authenticate(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if token.trim().is_empty() {
            self.reset();
            return false;
        }
        self.pending_login = None;
        self.auth_token = Some(token);
        self.state = ConversationState::Ready;
        true
    }

    /// Build a session in an arbitrary state, bypassing the transitions.
    #[cfg(test)]
    pub(crate) fn raw(
        state: ConversationState,
        pending_login: Option<&str>,
        auth_token: Option<&str>,
    ) -> Self {
        Self {
            state,
            pending_login: pending_login.map(str::to_string),
            auth_token: auth_token.map(str::to_string),
        }
    }
}
