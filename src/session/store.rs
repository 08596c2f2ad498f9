//! Session Store
//!
//! Per-browser-session storage for the pending authorization state, the
//! logged-in session and the "return to" URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ExternalAuthError, SessionError};
use crate::types::{AuthorizationState, Session, SessionId};

/// Session store interface.
///
/// Every method must be atomic for its session id; in particular
/// `take_state` hands a pending state to at most one caller.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store the pending authorization state, replacing any previous one.
    async fn put_state(
        &self,
        session_id: &SessionId,
        state: AuthorizationState,
    ) -> Result<(), ExternalAuthError>;

    /// Remove and return the pending authorization state.
    async fn take_state(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AuthorizationState>, ExternalAuthError>;

    /// Start a logged-in session, replacing any previous one.
    async fn start_session(
        &self,
        session_id: &SessionId,
        session: Session,
    ) -> Result<(), ExternalAuthError>;

    /// Get the logged-in session.
    async fn session(&self, session_id: &SessionId) -> Result<Option<Session>, ExternalAuthError>;

    /// Update the last activity timestamp. Returns false if no session exists.
    async fn touch(
        &self,
        session_id: &SessionId,
        at: DateTime<Utc>,
    ) -> Result<bool, ExternalAuthError>;

    /// Destroy the logged-in session.
    async fn end_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, ExternalAuthError>;

    /// Remember where to send the user after login.
    async fn set_return_to(
        &self,
        session_id: &SessionId,
        url: String,
    ) -> Result<(), ExternalAuthError>;

    /// Remove and return the remembered URL.
    async fn take_return_to(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<String>, ExternalAuthError>;
}

#[derive(Default, Clone)]
struct SessionData {
    state: Option<AuthorizationState>,
    session: Option<Session>,
    return_to: Option<String>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.state.is_none() && self.session.is_none() && self.return_to.is_none()
    }
}

/// In-memory session store implementation.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionData>>,
}

impl InMemorySessionStore {
    /// Create new in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a state is pending, without consuming it.
    pub fn has_pending_state(&self, session_id: &SessionId) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|data| data.state.is_some())
            .unwrap_or(false)
    }

    /// Number of sessions holding any data.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionData>>, SessionError> {
        self.sessions.lock().map_err(|_| SessionError::Storage {
            message: "session store lock poisoned".to_string(),
        })
    }

    fn update<T>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut SessionData) -> T,
    ) -> Result<T, ExternalAuthError> {
        let mut sessions = self.lock()?;
        let data = sessions.entry(session_id.clone()).or_default();
        let result = f(data);
        if data.is_empty() {
            sessions.remove(session_id);
        }
        Ok(result)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put_state(
        &self,
        session_id: &SessionId,
        state: AuthorizationState,
    ) -> Result<(), ExternalAuthError> {
        self.update(session_id, |data| data.state = Some(state))
    }

    async fn take_state(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AuthorizationState>, ExternalAuthError> {
        self.update(session_id, |data| data.state.take())
    }

    async fn start_session(
        &self,
        session_id: &SessionId,
        session: Session,
    ) -> Result<(), ExternalAuthError> {
        self.update(session_id, |data| data.session = Some(session))
    }

    async fn session(&self, session_id: &SessionId) -> Result<Option<Session>, ExternalAuthError> {
        Ok(self
            .lock()?
            .get(session_id)
            .and_then(|data| data.session.clone()))
    }

    async fn touch(
        &self,
        session_id: &SessionId,
        at: DateTime<Utc>,
    ) -> Result<bool, ExternalAuthError> {
        self.update(session_id, |data| match data.session.as_mut() {
            Some(session) => {
                session.last_activity_at = at;
                true
            }
            None => false,
        })
    }

    async fn end_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, ExternalAuthError> {
        self.update(session_id, |data| data.session.take())
    }

    async fn set_return_to(
        &self,
        session_id: &SessionId,
        url: String,
    ) -> Result<(), ExternalAuthError> {
        self.update(session_id, |data| data.return_to = Some(url))
    }

    async fn take_return_to(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<String>, ExternalAuthError> {
        self.update(session_id, |data| data.return_to.take())
    }
}
