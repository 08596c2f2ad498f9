//! Configuration Types
//!
//! Immutable provider and session-policy configuration, plus the serde
//! settings shape it is loaded from.

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use crate::mapping::UserInfoMapping;
use crate::types::ProviderKind;

/// Resolved configuration of one identity provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Client identifier issued by the provider.
    pub key: String,
    /// Client secret.
    pub secret: SecretString,
    /// Callback URL; a leading `/` means "relative to the current request".
    pub callback_url: String,
    pub scope: Option<String>,
    /// Base URL for relative token and user-info paths.
    pub site: String,
    /// Base URL for a relative authorize path.
    pub authorize_site: String,
    pub auth_path: String,
    pub token_url: String,
    pub user_info_url: Option<String>,
    /// Versioned API prefix, e.g. `v2.2` for the Graph API.
    pub api_version: Option<String>,
    pub display: Option<String>,
    /// JWKS endpoint for asymmetric id-token signatures.
    pub jwks_url: Option<String>,
    /// Expected id-token issuer.
    pub issuer: Option<String>,
    pub user_info_mapping: UserInfoMapping,
    /// Timeout for each call to this provider.
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Full authorize endpoint URL, including the API version segment.
    pub fn authorize_endpoint(&self) -> String {
        self.resolve(&self.authorize_site, &self.auth_path)
    }

    /// Full token endpoint URL.
    pub fn token_endpoint(&self) -> String {
        self.resolve(&self.site, &self.token_url)
    }

    /// Full user-info endpoint URL, if the provider has a fixed one.
    pub fn user_info_endpoint(&self) -> Option<String> {
        self.user_info_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| self.resolve(&self.site, url))
    }

    fn resolve(&self, base: &str, path: &str) -> String {
        if is_absolute(path) {
            return path.to_string();
        }
        let base = base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        match self.api_version.as_deref().filter(|v| !v.is_empty()) {
            Some(version) => format!("{}/{}/{}", base, version, path),
            None => format!("{}/{}", base, path),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("scope", &self.scope)
            .field("authorize_endpoint", &self.authorize_endpoint())
            .field("token_endpoint", &self.token_endpoint())
            .field("api_version", &self.api_version)
            .field("user_info_mapping", &self.user_info_mapping)
            .finish()
    }
}

pub(crate) fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// What the engine records about logins and activity.
#[derive(Clone, Debug)]
pub struct SessionPolicy {
    pub register_login_time: bool,
    pub register_logout_time: bool,
    pub register_last_activity_time: bool,
    pub register_last_ip_address: bool,
    /// Inactivity window after which a session is discarded.
    pub session_timeout: Option<Duration>,
    /// Whether the account system requires activation of new users.
    pub user_activation: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            register_login_time: true,
            register_logout_time: true,
            register_last_activity_time: true,
            register_last_ip_address: true,
            session_timeout: None,
            user_activation: false,
        }
    }
}

/// Where the callback handler sends the browser, and what it tells the user.
#[derive(Clone, Debug)]
pub struct RedirectPolicy {
    pub after_login_path: String,
    pub after_failure_path: String,
    pub login_path: String,
    pub success_notice: String,
    /// Alert after a failed login; the error's user message when unset.
    pub failure_alert: Option<String>,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            after_login_path: "/".to_string(),
            after_failure_path: "/".to_string(),
            login_path: "/login".to_string(),
            success_notice: "Signed in successfully.".to_string(),
            failure_alert: None,
        }
    }
}

/// Complete external-authentication configuration.
#[derive(Clone, Debug)]
pub struct ExternalAuthConfig {
    /// Providers enabled for login.
    pub external_providers: Vec<ProviderKind>,
    /// Per-provider configuration.
    pub providers: Vec<ProviderConfig>,
    pub session: SessionPolicy,
    pub redirects: RedirectPolicy,
    /// Lifetime of an issued state nonce.
    pub state_max_age: Duration,
}

pub const DEFAULT_STATE_MAX_AGE: Duration = Duration::from_secs(600);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Serialized provider settings.
#[derive(Clone, Deserialize)]
pub struct ProviderSettings {
    pub key: String,
    pub secret: SecretString,
    pub callback_url: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub auth_path: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub user_info_url: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub user_info_mapping: UserInfoMapping,
}

/// Serialized top-level settings.
#[derive(Clone, Deserialize)]
pub struct ExternalAuthSettings {
    pub external_providers: Vec<ProviderKind>,
    pub providers: std::collections::BTreeMap<ProviderKind, ProviderSettings>,
    #[serde(default = "default_true")]
    pub register_login_time: bool,
    #[serde(default = "default_true")]
    pub register_logout_time: bool,
    #[serde(default = "default_true")]
    pub register_last_activity_time: bool,
    #[serde(default = "default_true")]
    pub register_last_ip_address: bool,
    /// Seconds; fractional values allowed.
    #[serde(default)]
    pub session_timeout: Option<f64>,
    #[serde(default)]
    pub user_activation: bool,
    #[serde(default)]
    pub state_max_age_secs: Option<u64>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub after_login_path: Option<String>,
    #[serde(default)]
    pub after_failure_path: Option<String>,
    #[serde(default)]
    pub login_path: Option<String>,
}

fn default_true() -> bool {
    true
}
