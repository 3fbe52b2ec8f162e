//! Process-wide session state.
//!
//! A [`SessionStore`] is created once at startup and handed to whoever needs
//! to read the current token or user. The login flow is its only writer; it
//! goes through the [`SessionSink`] interface. Writes are last-writer-wins.

use std::sync::{Arc, PoisonError, RwLock};

use crate::auth::{Token, UserProfile};

pub mod cache;

/// An authenticated token and the user it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: Token,
    pub user: UserProfile,
}

/// Receives the results of a successful login.
pub trait SessionSink: Send + Sync {
    /// Makes `token` the credential presented by subsequent API calls.
    fn set_token(&self, token: Token);

    /// Records the authenticated user for the rest of the session.
    fn set_user(&self, user: UserProfile);

    /// Forgets token and user.
    fn clear(&self);
}

impl<T: SessionSink + ?Sized> SessionSink for Arc<T> {
    fn set_token(&self, token: Token) {
        (**self).set_token(token);
    }

    fn set_user(&self, user: UserProfile) {
        (**self).set_user(user);
    }

    fn clear(&self) {
        (**self).clear();
    }
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<Token>,
    user: Option<UserProfile>,
}

/// Shared handle to the session. Cloning yields another handle to the same
/// state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a previously saved session.
    pub fn restored(session: Session) -> Self {
        let store = Self::new();
        store.set_token(session.token);
        store.set_user(session.user);
        store
    }

    pub fn token(&self) -> Option<Token> {
        self.read(|state| state.token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read(|state| state.user.clone())
    }

    /// Returns the session if both token and user are present.
    pub fn current(&self) -> Option<Session> {
        self.read(|state| {
            Some(Session {
                token: state.token.clone()?,
                user: state.user.clone()?,
            })
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|state| state.token.is_some() && state.user.is_some())
    }

    fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut SessionState)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl SessionSink for SessionStore {
    fn set_token(&self, token: Token) {
        tracing::debug!(token = %token, "session token set");
        self.write(|state| state.token = Some(token));
    }

    fn set_user(&self, user: UserProfile) {
        tracing::debug!(user_id = user.id, "session user set");
        self.write(|state| state.user = Some(user));
    }

    fn clear(&self) {
        tracing::debug!("session cleared");
        self.write(|state| *state = SessionState::default());
    }
}
