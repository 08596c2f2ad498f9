//! Token Exchange
//!
//! Callback-side entry points: verify the returned state, redeem the code,
//! and resolve the identity behind the token.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::{verify_and_consume, HttpTransport};
use crate::error::ExternalAuthError;
use crate::flows::flow_for;
use crate::session::SessionStore;
use crate::types::{AccessToken, ExternalIdentity, ProviderConfig, SessionId};

/// One code redemption.
#[derive(Clone, Copy, Debug)]
pub struct ExchangeRequest<'a> {
    pub session_id: &'a SessionId,
    pub code: &'a str,
    /// `state` as received on the callback.
    pub received_state: Option<&'a str>,
    /// Must equal the `redirect_uri` sent on the authorize request.
    pub redirect_uri: &'a str,
}

/// Verify the session's pending state against the callback, then redeem the
/// authorization code.
///
/// The pending state is consumed whatever the outcome. A session with no
/// pending state passes only when the callback carries no state either.
/// Nothing is retried.
#[tracing::instrument(skip_all, fields(provider = %provider.kind, session = %request.session_id))]
pub async fn exchange<S: SessionStore + ?Sized>(
    provider: &ProviderConfig,
    transport: &dyn HttpTransport,
    sessions: &S,
    request: ExchangeRequest<'_>,
    state_max_age: Duration,
    now: DateTime<Utc>,
) -> Result<AccessToken, ExternalAuthError> {
    check_state(
        sessions,
        request.session_id,
        request.received_state,
        state_max_age,
        now,
    )
    .await?;
    redeem_code(provider, transport, request.code, request.redirect_uri).await
}

/// Consume the session's pending state and fail unless the callback's
/// `state` matches it.
pub async fn check_state<S: SessionStore + ?Sized>(
    sessions: &S,
    session_id: &SessionId,
    received_state: Option<&str>,
    state_max_age: Duration,
    now: DateTime<Utc>,
) -> Result<(), ExternalAuthError> {
    let check = verify_and_consume(sessions, session_id, received_state, state_max_age, now).await?;
    Ok(check.into_result(received_state)?)
}

/// Redeem an authorization code whose state has already been checked.
pub async fn redeem_code(
    provider: &ProviderConfig,
    transport: &dyn HttpTransport,
    code: &str,
    redirect_uri: &str,
) -> Result<AccessToken, ExternalAuthError> {
    let token = flow_for(provider.kind)
        .exchange_token(provider, transport, code, redirect_uri)
        .await
        .map_err(|e| {
            tracing::warn!(error_code = e.error_code(), "token exchange failed");
            e
        })?;

    tracing::info!("authorization code exchanged");
    Ok(token)
}

/// Resolve the external identity behind `token`.
pub async fn fetch_identity(
    provider: &ProviderConfig,
    transport: &dyn HttpTransport,
    token: &AccessToken,
) -> Result<ExternalIdentity, ExternalAuthError> {
    flow_for(provider.kind)
        .fetch_identity(provider, transport, token)
        .await
}
