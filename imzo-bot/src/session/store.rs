//! Concurrency-safe session store.

use super::state::Session;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory map from session key to [`Session`].
///
/// Sessions are created lazily and live for the whole process. All access
/// goes through one store-wide lock; callers never get a reference that
/// outlives the critical section, and no network I/O happens under it.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the session for `key`, creating an idle one if absent.
    pub async fn get(&self, key: &str) -> Session {
        if let Some(session) = self.sessions.read().await.get(key) {
            return session.clone();
        }
        self.sessions
            .write()
            .await
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(key = %key, "created new session");
                Session::new()
            })
            .clone()
    }

    /// Apply `f` to the session for `key` under exclusive access.
    ///
    /// The session is created idle if absent.
    pub async fn mutate<R>(&self, key: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(key.to_string()).or_insert_with(|| {
            debug!(key = %key, "created new session");
            Session::new()
        });
        f(session)
    }

    /// Number of known sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session exists yet.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConversationState;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_creates_lazily() {
        let store = SessionStore::new();
        assert!(store.is_empty().await);

        let session = store.get("telegram:1").await;
        assert_eq!(session.state(), ConversationState::Idle);
        assert_eq!(store.len().await, 1);

        store.get("telegram:1").await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_mutate_persists() {
        let store = SessionStore::new();

        let state = store
            .mutate("telegram:1", |s| {
                s.begin_login();
                s.state()
            })
            .await;
        assert_eq!(state, ConversationState::AwaitingLogin);

        let snapshot = store.get("telegram:1").await;
        assert_eq!(snapshot.state(), ConversationState::AwaitingLogin);

        // Snapshots are detached copies.
        let mut detached = store.get("telegram:1").await;
        detached.reset();
        assert_eq!(
            store.get("telegram:1").await.state(),
            ConversationState::AwaitingLogin
        );
    }

    #[tokio::test]
    async fn test_concurrent_chats_are_isolated() {
        let store = Arc::new(SessionStore::new());

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let key = format!("telegram:{i}");
                store.mutate(&key, Session::begin_login).await;
                store
                    .mutate(&key, |s| s.remember_login(format!("user-{i}")))
                    .await;
                if i % 2 == 0 {
                    store
                        .mutate(&key, |s| s.authenticate(format!("tok-{i}")))
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 32);
        for i in 0..32 {
            let session = store.get(&format!("telegram:{i}")).await;
            if i % 2 == 0 {
                assert_eq!(session.auth_token(), Some(format!("tok-{i}").as_str()));
            } else {
                assert_eq!(session.pending_login(), Some(format!("user-{i}").as_str()));
                assert_eq!(session.state(), ConversationState::AwaitingPassword);
            }
        }
    }
}
