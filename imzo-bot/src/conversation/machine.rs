//! Pure transition function of the login handshake.

use super::replies::Reply;
use crate::session::{ConversationState, Session};

/// Command that restarts the login cycle from any state.
pub const START_COMMAND: &str = "/start";

/// What the handler has to do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a canned reply.
    Reply(Reply),
    /// Exchange the credentials for a token.
    Authenticate {
        /// Cached identifier.
        login: String,
        /// Secret just received.
        password: String,
    },
    /// Submit a question with the session's token.
    Submit {
        /// Token snapshot.
        token: String,
        /// Question text.
        question: String,
    },
}

/// Result of [`dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Work left for the handler.
    pub effect: Effect,
    /// The session was reset; pending pollers of the chat are stale.
    pub reset: bool,
}

impl Step {
    const fn new(effect: Effect) -> Self {
        Self {
            effect,
            reset: false,
        }
    }

    const fn with_reset(effect: Effect) -> Self {
        Self {
            effect,
            reset: true,
        }
    }
}

/// Apply one inbound text to a session.
///
/// Performs no I/O: the session is updated in place and the returned
/// [`Step`] names the side effect. `text` is expected to be trimmed and
/// non-empty.
pub fn dispatch(session: &mut Session, text: &str) -> Step {
    if text.starts_with(START_COMMAND) {
        session.begin_login();
        return Step::with_reset(Effect::Reply(Reply::StartPrompt));
    }

    match session.state() {
        ConversationState::Idle => {
            session.begin_login();
            Step::new(Effect::Reply(Reply::StartPrompt))
        }
        ConversationState::AwaitingLogin => {
            session.remember_login(text);
            Step::new(Effect::Reply(Reply::PasswordPrompt))
        }
        ConversationState::AwaitingPassword => match session.take_pending_login() {
            Some(login) => Step::new(Effect::Authenticate {
                login,
                password: text.to_string(),
            }),
            None => {
                session.reset();
                Step::with_reset(Effect::Reply(Reply::LoginRequired))
            }
        },
        ConversationState::Ready => match session.auth_token() {
            Some(token) => Step::new(Effect::Submit {
                token: token.to_string(),
                question: text.to_string(),
            }),
            None => {
                session.reset();
                Step::with_reset(Effect::Reply(Reply::LoginRequired))
            }
        },
    }
}
