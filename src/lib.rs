//! External Authentication
//!
//! Login through external identity providers (OAuth2 and OpenID Connect):
//! provider redirects, authorization-code exchange, user-info mapping and
//! reconciliation with local accounts and sessions.
//!
//! # Features
//!
//! - Provider registry for Facebook, GitHub, Google, Windows Live, VK,
//!   Salesforce, PayPal and generic OpenID Connect
//! - Authorization URLs with anti-CSRF `state` nonces
//! - Authorization Code grant (RFC 6749 Section 4.1) with id-token
//!   validation for OpenID Connect (feature `jwt`)
//! - Declarative `/`-path mapping of user-info payloads onto user attributes
//! - Session login, timeout, activity tracking and logout
//!
//! # Example
//!
//! ```rust,ignore
//! use external_auth::{
//!     CallbackParams, ExternalAuthClient, ExternalAuthConfigBuilder, MissingAccountPolicy,
//!     ProviderConfigBuilder, ProviderKind, RequestContext, RequestOrigin, SessionId,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExternalAuthConfigBuilder::new()
//!         .provider(
//!             ProviderConfigBuilder::new(ProviderKind::Github)
//!                 .key("my-client-id")
//!                 .secret("my-client-secret")
//!                 .callback_url("/oauth/github/callback")
//!                 .map("username", "login")
//!                 .build(),
//!         )
//!         .enable(ProviderKind::Github)
//!         .build()?;
//!
//!     let client = ExternalAuthClient::new(config)?;
//!     let session = SessionId::new("cookie-value");
//!     let origin = RequestOrigin::new("https", "myapp.com");
//!     let request = RequestContext::new(&session, &origin);
//!
//!     // Redirect out
//!     let url = client
//!         .login_at("github", request, &external_auth::AuthorizeOptions::generate_state())
//!         .await?;
//!     println!("Send the browser to: {}", url.url);
//!
//!     // Callback in
//!     let callback = CallbackParams::from_url_str(
//!         "https://myapp.com/oauth/github/callback?code=abc&state=xyz",
//!     )?;
//!     let redirect = client
//!         .handle_callback("github", request, &callback, MissingAccountPolicy::Create)
//!         .await;
//!     println!("Then to: {}", redirect.location);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: provider, configuration, token, session and user types
//! - `error`: error hierarchy and provider error mapping
//! - `core`: HTTP transport, clock and state verification
//! - `registry`: enabled providers by name
//! - `flows`: authorize URLs and the OAuth2 / OpenID Connect exchanges
//! - `mapping`: user-info payload to user attributes
//! - `session`: account and session stores, and the reconciliation engine
//! - `builders`: fluent configuration builders
//! - `client`: the login flow end to end

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod mapping;
pub mod registry;
pub mod session;
pub mod types;

// Re-export main client
pub use client::{ExternalAuthClient, MissingAccountPolicy, RequestContext};

// Re-export builders
pub use builders::{external_auth_config, ExternalAuthConfigBuilder, ProviderConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, map_token_error, parse_error_response,
    AccountError, AuthorizationError, ConfigurationError, ExternalAuthError, ExternalAuthResult,
    NetworkError, OAuth2ErrorResponse, ProtocolError, ProviderError, SessionError,
    TokenExchangeError,
};

// Re-export types
pub use types::{
    // Provider
    ProtocolVariant, ProviderDefaults, ProviderKind, TokenPlacement, ALL_PROVIDERS,
    // Config
    ExternalAuthConfig, ExternalAuthSettings, ProviderConfig, ProviderSettings, RedirectPolicy,
    SessionPolicy,
    // Token
    AccessToken, TokenResponse,
    // Callback
    CallbackParams, Flash, Redirect, RequestOrigin,
    // Identity and session
    ActivationState, ActivityRecord, AuthenticationRecord, AuthorizationState, ExternalIdentity,
    Session, SessionId, User, UserOrigin,
};

// Re-export core components
pub use core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // Clock
    Clock, MockClock, SystemClock,
    // State
    generate_nonce, issue_state, verify_and_consume, StateCheck,
};

// Re-export flows
pub use flows::{
    build_redirect, flow_for, AuthorizationUrl, AuthorizeOptions, OAuth2Flow, OidcFlow,
    ProviderFlow, StateRequest,
};

// Re-export mapping
pub use mapping::{map_user_info, AttributePath, MappedAttributes, UserInfoMapping};

// Re-export registry
pub use registry::ProviderRegistry;

// Re-export sessions
pub use session::{
    Access, AccountStore, CompletionCallback, InMemoryAccountStore, InMemorySessionStore,
    NoOpNotificationHook, NotificationHook, NotificationKind, RecordingNotificationHook,
    SessionReconciler, SessionStore,
};
