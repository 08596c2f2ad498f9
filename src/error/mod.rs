//! External Authentication Error Types
//!
//! Error hierarchy for the redirect, exchange and reconciliation stages.

use std::time::Duration;
use thiserror::Error;

/// Root error type for external authentication.
#[derive(Error, Debug)]
pub enum ExternalAuthError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Token exchange failed: {0}")]
    TokenExchange(#[from] TokenExchangeError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl ExternalAuthError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(ConfigurationError::UnknownProvider { .. }) => {
                "EXTAUTH_UNKNOWN_PROVIDER"
            }
            Self::Configuration(_) => "EXTAUTH_CONFIG",
            Self::Authorization(AuthorizationError::StateMismatch { .. }) => {
                "EXTAUTH_STATE_MISMATCH"
            }
            Self::Authorization(_) => "EXTAUTH_AUTH",
            Self::TokenExchange(_) => "EXTAUTH_TOKEN_EXCHANGE",
            Self::Account(_) => "EXTAUTH_ACCOUNT",
            Self::Session(_) => "EXTAUTH_SESSION",
        }
    }

    /// True for failures of the upstream provider (network, protocol or
    /// provider error payloads).
    pub fn is_token_exchange_failure(&self) -> bool {
        matches!(self, Self::TokenExchange(_))
    }

    /// Message safe to show the end user.
    pub fn user_message(&self) -> String {
        get_user_message(self)
    }

    /// True when the callback failed anti-CSRF verification.
    pub fn is_state_failure(&self) -> bool {
        matches!(
            self,
            Self::Authorization(
                AuthorizationError::StateMismatch { .. } | AuthorizationError::StateExpired
            )
        )
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Unknown or disabled provider: {name}")]
    UnknownProvider { name: String },

    #[error("Missing required field {field} for provider {provider}")]
    MissingField { provider: String, field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Authorization (redirect round trip) error.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch { received: Option<String> },

    #[error("State parameter expired")]
    StateExpired,

    #[error("Access denied by provider: {error}")]
    AccessDenied {
        error: String,
        error_description: Option<String>,
    },

    #[error("Missing authorization code in callback")]
    MissingCode,
}

/// Failure talking to the identity provider.
#[derive(Error, Debug)]
pub enum TokenExchangeError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid id token: {message}")]
    InvalidIdToken { message: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// Error payload returned by the provider's token or user-info endpoint.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid client credentials")]
    InvalidClient { error_description: Option<String> },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Server error: {message}")]
    ServerError { message: String },
}

/// Account store error.
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("No account linked to {provider}:{uid}")]
    NotFound { provider: String, uid: String },

    #[error("Authentication {provider}:{uid} is already linked to a user")]
    DuplicateAuthentication { provider: String, uid: String },

    #[error("Account creation rejected: {reason}")]
    Rejected { reason: String },

    #[error("Account storage failed: {message}")]
    Storage { message: String },
}

/// Session store error.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session storage failed: {message}")]
    Storage { message: String },
}

impl From<NetworkError> for ExternalAuthError {
    fn from(error: NetworkError) -> Self {
        Self::TokenExchange(TokenExchangeError::Network(error))
    }
}

impl From<ProtocolError> for ExternalAuthError {
    fn from(error: ProtocolError) -> Self {
        Self::TokenExchange(TokenExchangeError::Protocol(error))
    }
}

impl From<ProviderError> for ExternalAuthError {
    fn from(error: ProviderError) -> Self {
        Self::TokenExchange(TokenExchangeError::Provider(error))
    }
}

/// Result type for external authentication operations.
pub type ExternalAuthResult<T> = Result<T, ExternalAuthError>;

/// OAuth2 error response body.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Map a token endpoint error body to a provider error.
pub fn map_token_error(response: &OAuth2ErrorResponse) -> ProviderError {
    let description = || {
        response
            .error_description
            .clone()
            .unwrap_or_else(|| response.error.clone())
    };
    match response.error.as_str() {
        "invalid_client" => ProviderError::InvalidClient {
            error_description: response.error_description.clone(),
        },
        "invalid_grant" => ProviderError::InvalidGrant {
            message: description(),
        },
        "server_error" | "temporarily_unavailable" => ProviderError::ServerError {
            message: description(),
        },
        _ => ProviderError::InvalidRequest {
            message: description(),
        },
    }
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create error from a non-success provider response.
pub fn create_error_from_response(status: u16, body: &str) -> ExternalAuthError {
    if let Some(response) = parse_error_response(body) {
        return map_token_error(&response).into();
    }

    let error = match status {
        400 => ProviderError::InvalidRequest {
            message: "Bad request".to_string(),
        },
        401 => ProviderError::InvalidClient {
            error_description: Some("Unauthorized".to_string()),
        },
        _ => ProviderError::ServerError {
            message: format!("HTTP {}", status),
        },
    };

    error.into()
}

/// Get the end-user message for a failed login.
///
/// Provider payloads are never surfaced; everything except a missing or
/// disabled provider collapses into one generic message.
pub fn get_user_message(error: &ExternalAuthError) -> String {
    match error {
        ExternalAuthError::Configuration(ConfigurationError::UnknownProvider { .. }) => {
            "This sign-in method is not available.".to_string()
        }
        _ => "Signing in with the external provider failed. Please try again.".to_string(),
    }
}
