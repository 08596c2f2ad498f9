//! Session Types
//!
//! Per-browser-session state: the pending authorization nonce and the
//! logged-in session.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Opaque identifier of a browser session (cookie value).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Anti-CSRF nonce pending between redirect-out and callback-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationState {
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationState {
    pub fn new(nonce: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            nonce: nonce.into(),
            created_at,
        }
    }

    /// Check if state is older than `max_age` at `now`.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        exceeds(self.created_at, now, max_age)
    }
}

/// Logged-in session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub login_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub ip_address: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            login_at: now,
            last_activity_at: now,
            ip_address: None,
        }
    }

    pub fn with_ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    /// Check whether the session has been idle longer than `timeout`.
    pub fn is_timed_out(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        exceeds(self.last_activity_at, now, timeout)
    }
}

fn exceeds(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    match chrono::Duration::from_std(limit) {
        Ok(limit) => now - since > limit,
        Err(_) => false,
    }
}
