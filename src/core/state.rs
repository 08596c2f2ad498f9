//! State Verification
//!
//! Issues the anti-CSRF `state` nonce on redirect-out and checks it on
//! callback-in. A stored state is single-use: it is removed on the first
//! verification attempt whatever the outcome.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

use crate::error::{AuthorizationError, ExternalAuthError};
use crate::session::SessionStore;
use crate::types::{AuthorizationState, SessionId};

/// Outcome of checking a callback's `state` against the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateCheck {
    /// Stored nonce matched.
    Verified,
    /// No state was issued for this session and the callback carried none.
    NotIssued,
    /// The callback carried a state but none is pending, e.g. a replay of
    /// an already consumed nonce.
    Unexpected,
    /// A state was issued but the callback carried none.
    Missing,
    /// The callback carried a different value.
    Mismatch,
    /// The nonce matched but is older than the allowed age.
    Expired,
}

impl StateCheck {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Convert to the error reported to callers. Missing, mismatched and
    /// replayed states are the same failure from the outside.
    pub fn into_result(self, received: Option<&str>) -> Result<(), AuthorizationError> {
        match self {
            Self::Verified | Self::NotIssued => Ok(()),
            Self::Missing | Self::Mismatch | Self::Unexpected => {
                Err(AuthorizationError::StateMismatch {
                    received: received.map(str::to_string),
                })
            }
            Self::Expired => Err(AuthorizationError::StateExpired),
        }
    }
}

/// 32 random bytes, base64url without padding.
pub fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Generate a fresh nonce, store it for the session and return it.
pub async fn issue_state<S: SessionStore + ?Sized>(
    store: &S,
    session_id: &SessionId,
    now: DateTime<Utc>,
) -> Result<String, ExternalAuthError> {
    let nonce = generate_nonce();
    store_state(store, session_id, &nonce, now).await?;
    Ok(nonce)
}

/// Store a caller-chosen state value for the session.
pub async fn store_state<S: SessionStore + ?Sized>(
    store: &S,
    session_id: &SessionId,
    value: &str,
    now: DateTime<Utc>,
) -> Result<(), ExternalAuthError> {
    store
        .put_state(session_id, AuthorizationState::new(value, now))
        .await
}

/// Drop any pending state for the session.
pub async fn clear_state<S: SessionStore + ?Sized>(
    store: &S,
    session_id: &SessionId,
) -> Result<(), ExternalAuthError> {
    store.take_state(session_id).await.map(|_| ())
}

/// Consume the session's pending state and compare it with `candidate`.
pub async fn verify_and_consume<S: SessionStore + ?Sized>(
    store: &S,
    session_id: &SessionId,
    candidate: Option<&str>,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<StateCheck, ExternalAuthError> {
    let stored = store.take_state(session_id).await?;

    let check = match (stored, candidate) {
        (None, None) => StateCheck::NotIssued,
        (None, Some(_)) => StateCheck::Unexpected,
        (Some(_), None) => StateCheck::Missing,
        (Some(stored), Some(candidate)) => {
            if !constant_time_eq(&stored.nonce, candidate) {
                StateCheck::Mismatch
            } else if stored.is_expired(max_age, now) {
                StateCheck::Expired
            } else {
                StateCheck::Verified
            }
        }
    };

    match check {
        StateCheck::Verified | StateCheck::NotIssued => {
            tracing::debug!(session = %session_id, ?check, "state check passed")
        }
        _ => tracing::warn!(session = %session_id, ?check, "state check failed"),
    }

    Ok(check)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(a.as_bytes(), b.as_bytes()).is_ok()
}
