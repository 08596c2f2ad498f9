//! Provider Flows
//!
//! The authorization-code flow for each supported provider:
//!
//! - **OAuth2**: code grant, then a provider-specific user-info call
//! - **OpenID Connect**: code grant returning a validated id token
//!
//! Both variants sit behind [`ProviderFlow`], selected by the provider's
//! protocol.

use async_trait::async_trait;

use crate::core::HttpTransport;
use crate::error::ExternalAuthError;
use crate::types::{AccessToken, ExternalIdentity, ProtocolVariant, ProviderConfig, ProviderKind};

pub mod authorize;
pub mod exchange;
pub mod oauth2;
pub mod oidc;

pub use authorize::{
    build_redirect, render_query, resolve_callback_url, AuthorizationUrl, AuthorizeOptions,
    StateRequest,
};
pub use exchange::{check_state, exchange, fetch_identity, redeem_code};
pub use oauth2::OAuth2Flow;
pub use oidc::OidcFlow;

/// One authorize query parameter; `None` renders as a bare key.
pub type QueryParam = (&'static str, Option<String>);

/// Protocol capabilities of a provider.
#[async_trait]
pub trait ProviderFlow: Send + Sync {
    /// Ordered authorize query parameters.
    fn authorize_params(
        &self,
        provider: &ProviderConfig,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Vec<QueryParam>;

    /// Redeem an authorization code.
    async fn exchange_token(
        &self,
        provider: &ProviderConfig,
        transport: &dyn HttpTransport,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, ExternalAuthError>;

    /// Resolve the external identity behind a token.
    async fn fetch_identity(
        &self,
        provider: &ProviderConfig,
        transport: &dyn HttpTransport,
        token: &AccessToken,
    ) -> Result<ExternalIdentity, ExternalAuthError>;
}

/// Flow implementation for a provider.
pub fn flow_for(kind: ProviderKind) -> &'static dyn ProviderFlow {
    match kind.protocol() {
        ProtocolVariant::OAuth2 => &OAuth2Flow,
        ProtocolVariant::OpenIdConnect => &OidcFlow,
    }
}
