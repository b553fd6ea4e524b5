use std::sync::Arc;

use board_protocol::user::User;
use serde::Deserialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Where the reconciler learns who "we" are.
pub trait SessionSource: Send + Sync {
    fn current_user_id(&self) -> Option<i64>;
}

/// Shared login state. Subscribers see logouts, including the forced one
/// after a 401.
#[derive(Clone)]
pub struct AuthStore {
    session: Arc<watch::Sender<Option<Session>>>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            session: Arc::new(tx),
        }
    }

    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.set(session);
        store
    }

    pub fn set(&self, session: Session) {
        self.session.send_replace(Some(session));
    }

    pub fn clear(&self) {
        if self.session.send_replace(None).is_some() {
            tracing::info!("session cleared");
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.session.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

impl SessionSource for AuthStore {
    fn current_user_id(&self) -> Option<i64> {
        self.session.borrow().as_ref().map(|s| s.user.id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;

    use super::*;

    pub(crate) fn session(user_id: i64) -> Session {
        Session {
            token: format!("token-{user_id}"),
            user: User {
                id: user_id,
                email: "ana@vibeweb.dev".to_string(),
                username: Some("ana".to_string()),
                name: "Ana".to_string(),
                avatar_url: None,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn clear_notifies_subscribers() {
        let auth = AuthStore::with_session(session(7));
        let mut rx = auth.subscribe();
        assert_eq!(auth.current_user_id(), Some(7));
        assert_eq!(auth.token().as_deref(), Some("token-7"));

        auth.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
        assert!(!auth.is_logged_in());
        assert_eq!(auth.current_user_id(), None);
    }
}
