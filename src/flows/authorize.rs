//! Authorization Request
//!
//! Builds the provider URL the browser is redirected to, and manages the
//! state nonce that goes with it.

use chrono::{DateTime, Utc};

use crate::core::{clear_state, issue_state, store_state};
use crate::error::ExternalAuthError;
use crate::flows::{flow_for, QueryParam};
use crate::session::SessionStore;
use crate::types::{ProviderConfig, RequestOrigin, SessionId};

/// What to do with the `state` parameter of one authorization request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StateRequest {
    /// No state; any state pending for the session is discarded.
    #[default]
    Omit,
    /// Generate a random nonce.
    Generate,
    /// Use a caller-chosen value.
    Value(String),
}

/// Authorization request options.
#[derive(Clone, Debug, Default)]
pub struct AuthorizeOptions {
    pub state: StateRequest,
}

impl AuthorizeOptions {
    pub fn with_state(state: impl Into<String>) -> Self {
        Self {
            state: StateRequest::Value(state.into()),
        }
    }

    pub fn generate_state() -> Self {
        Self {
            state: StateRequest::Generate,
        }
    }
}

/// Authorization URL with the state stored for the session, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationUrl {
    pub url: String,
    pub state: Option<String>,
}

/// Resolve the provider's callback URL for a request from `origin`.
pub fn resolve_callback_url(provider: &ProviderConfig, origin: &RequestOrigin) -> String {
    if provider.callback_url.starts_with('/') {
        format!("{}{}", origin.base(), provider.callback_url)
    } else {
        provider.callback_url.clone()
    }
}

/// Render query parameters in order. A parameter without a value is
/// emitted as a bare key.
pub fn render_query(params: &[QueryParam]) -> String {
    params
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{}={}", key, encode(value)),
            None => (*key).to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Build the redirect-out URL for `provider`, updating the session's pending
/// state according to `options`.
pub async fn build_redirect<S: SessionStore + ?Sized>(
    provider: &ProviderConfig,
    origin: &RequestOrigin,
    store: &S,
    session_id: &SessionId,
    options: &AuthorizeOptions,
    now: DateTime<Utc>,
) -> Result<AuthorizationUrl, ExternalAuthError> {
    let state = match &options.state {
        StateRequest::Omit => {
            clear_state(store, session_id).await?;
            None
        }
        StateRequest::Generate => Some(issue_state(store, session_id, now).await?),
        StateRequest::Value(value) => {
            store_state(store, session_id, value, now).await?;
            Some(value.clone())
        }
    };

    let redirect_uri = resolve_callback_url(provider, origin);
    let params =
        flow_for(provider.kind).authorize_params(provider, &redirect_uri, state.as_deref());

    let endpoint = provider.authorize_endpoint();
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    let url = format!("{}{}{}", endpoint, separator, render_query(&params));

    tracing::debug!(
        provider = %provider.kind,
        with_state = state.is_some(),
        "built authorization url"
    );
    Ok(AuthorizationUrl { url, state })
}
