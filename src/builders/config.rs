//! Configuration Builders
//!
//! Fluent builders for provider and engine configuration, and loading from
//! serialized settings.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigurationError;
use crate::mapping::UserInfoMapping;
use crate::types::{
    ExternalAuthConfig, ExternalAuthSettings, ProviderConfig, ProviderKind, ProviderSettings,
    RedirectPolicy, SessionPolicy, DEFAULT_HTTP_TIMEOUT, DEFAULT_STATE_MAX_AGE,
};

/// Provider configuration builder, seeded with the provider's defaults.
pub struct ProviderConfigBuilder {
    kind: ProviderKind,
    key: String,
    secret: SecretString,
    callback_url: String,
    scope: Option<String>,
    site: String,
    authorize_site: Option<String>,
    auth_path: String,
    token_url: String,
    user_info_url: Option<String>,
    api_version: Option<String>,
    display: Option<String>,
    jwks_url: Option<String>,
    issuer: Option<String>,
    user_info_mapping: UserInfoMapping,
    timeout: Duration,
}

impl ProviderConfigBuilder {
    /// Create a builder with the built-in endpoints of `kind`.
    pub fn new(kind: ProviderKind) -> Self {
        let defaults = kind.defaults();
        Self {
            kind,
            key: String::new(),
            secret: SecretString::new(String::new()),
            callback_url: String::new(),
            scope: defaults.scope.map(str::to_string),
            site: defaults.site.to_string(),
            authorize_site: defaults.authorize_site.map(str::to_string),
            auth_path: defaults.auth_path.to_string(),
            token_url: defaults.token_url.to_string(),
            user_info_url: Some(defaults.user_info_url.to_string()).filter(|url| !url.is_empty()),
            api_version: None,
            display: defaults.display.map(str::to_string),
            jwks_url: None,
            issuer: None,
            user_info_mapping: UserInfoMapping::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set client key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set client secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = SecretString::new(secret.into());
        self
    }

    /// Set callback URL. A leading `/` resolves against the request origin.
    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = url.into();
        self
    }

    /// Set requested scope (space separated).
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Request no scope at all.
    pub fn no_scope(mut self) -> Self {
        self.scope = None;
        self
    }

    /// Set base URL for token and user-info paths.
    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    /// Set base URL for the authorize path.
    pub fn authorize_site(mut self, site: impl Into<String>) -> Self {
        self.authorize_site = Some(site.into());
        self
    }

    /// Set authorize path or URL.
    pub fn auth_path(mut self, path: impl Into<String>) -> Self {
        self.auth_path = path.into();
        self
    }

    /// Set token path or URL.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set user-info path or URL.
    pub fn user_info_url(mut self, url: impl Into<String>) -> Self {
        self.user_info_url = Some(url.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Replace the user-info mapping.
    pub fn user_info_mapping(mut self, mapping: UserInfoMapping) -> Self {
        self.user_info_mapping = mapping;
        self
    }

    /// Map one local attribute from a `/`-delimited payload path.
    pub fn map(mut self, target: impl Into<String>, source: &str) -> Self {
        self.user_info_mapping.insert(target, source);
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the provider configuration. Field validation happens when the
    /// registry loads it.
    pub fn build(self) -> ProviderConfig {
        let authorize_site = self.authorize_site.unwrap_or_else(|| self.site.clone());
        ProviderConfig {
            kind: self.kind,
            key: self.key,
            secret: self.secret,
            callback_url: self.callback_url,
            scope: self.scope,
            site: self.site,
            authorize_site,
            auth_path: self.auth_path,
            token_url: self.token_url,
            user_info_url: self.user_info_url,
            api_version: self.api_version,
            display: self.display,
            jwks_url: self.jwks_url,
            issuer: self.issuer,
            user_info_mapping: self.user_info_mapping,
            timeout: self.timeout,
        }
    }
}

/// Engine configuration builder.
#[derive(Default)]
pub struct ExternalAuthConfigBuilder {
    external_providers: Vec<ProviderKind>,
    providers: Vec<ProviderConfig>,
    session: SessionPolicy,
    redirects: RedirectPolicy,
    state_max_age: Option<Duration>,
}

impl ExternalAuthConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a provider configuration without enabling it.
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.retain(|p| p.kind != provider.kind);
        self.providers.push(provider);
        self
    }

    /// Enable a configured provider for login.
    pub fn enable(mut self, kind: ProviderKind) -> Self {
        if !self.external_providers.contains(&kind) {
            self.external_providers.push(kind);
        }
        self
    }

    /// Replace the whole session policy.
    pub fn session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session = policy;
        self
    }

    pub fn register_login_time(mut self, enable: bool) -> Self {
        self.session.register_login_time = enable;
        self
    }

    pub fn register_logout_time(mut self, enable: bool) -> Self {
        self.session.register_logout_time = enable;
        self
    }

    pub fn register_last_activity_time(mut self, enable: bool) -> Self {
        self.session.register_last_activity_time = enable;
        self
    }

    pub fn register_last_ip_address(mut self, enable: bool) -> Self {
        self.session.register_last_ip_address = enable;
        self
    }

    /// Discard sessions idle for longer than `timeout`.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session.session_timeout = Some(timeout);
        self
    }

    pub fn user_activation(mut self, enable: bool) -> Self {
        self.session.user_activation = enable;
        self
    }

    /// Lifetime of an issued state nonce.
    pub fn state_max_age(mut self, max_age: Duration) -> Self {
        self.state_max_age = Some(max_age);
        self
    }

    pub fn after_login_path(mut self, path: impl Into<String>) -> Self {
        self.redirects.after_login_path = path.into();
        self
    }

    pub fn after_failure_path(mut self, path: impl Into<String>) -> Self {
        self.redirects.after_failure_path = path.into();
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.redirects.login_path = path.into();
        self
    }

    /// Flash notice shown after a successful external login.
    pub fn success_notice(mut self, message: impl Into<String>) -> Self {
        self.redirects.success_notice = message.into();
        self
    }

    /// Flash alert shown after a failed external login.
    pub fn failure_alert(mut self, message: impl Into<String>) -> Self {
        self.redirects.failure_alert = Some(message.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ExternalAuthConfig, ConfigurationError> {
        for kind in &self.external_providers {
            if !self.providers.iter().any(|p| p.kind == *kind) {
                return Err(ConfigurationError::MissingField {
                    provider: kind.to_string(),
                    field: "configuration".to_string(),
                });
            }
        }

        Ok(ExternalAuthConfig {
            external_providers: self.external_providers,
            providers: self.providers,
            session: self.session,
            redirects: self.redirects,
            state_max_age: self.state_max_age.unwrap_or(DEFAULT_STATE_MAX_AGE),
        })
    }
}

impl ExternalAuthConfig {
    /// Load configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let settings: ExternalAuthSettings =
            serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidConfig {
                message: e.to_string(),
            })?;
        Self::from_settings(settings)
    }

    /// Resolve deserialized settings against the provider defaults.
    pub fn from_settings(settings: ExternalAuthSettings) -> Result<Self, ConfigurationError> {
        let timeout = settings
            .http_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);

        let mut builder = ExternalAuthConfigBuilder::new()
            .register_login_time(settings.register_login_time)
            .register_logout_time(settings.register_logout_time)
            .register_last_activity_time(settings.register_last_activity_time)
            .register_last_ip_address(settings.register_last_ip_address)
            .user_activation(settings.user_activation);

        if let Some(secs) = settings.session_timeout {
            let timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
                ConfigurationError::InvalidConfig {
                    message: format!("session_timeout: {}", e),
                }
            })?;
            builder = builder.session_timeout(timeout);
        }
        if let Some(secs) = settings.state_max_age_secs {
            builder = builder.state_max_age(Duration::from_secs(secs));
        }
        if let Some(path) = settings.after_login_path {
            builder = builder.after_login_path(path);
        }
        if let Some(path) = settings.after_failure_path {
            builder = builder.after_failure_path(path);
        }
        if let Some(path) = settings.login_path {
            builder = builder.login_path(path);
        }

        for (kind, provider) in settings.providers {
            builder = builder.provider(provider_from_settings(kind, provider, timeout));
        }
        for kind in settings.external_providers {
            builder = builder.enable(kind);
        }

        builder.build()
    }
}

fn provider_from_settings(
    kind: ProviderKind,
    settings: ProviderSettings,
    timeout: Duration,
) -> ProviderConfig {
    let mut builder = ProviderConfigBuilder::new(kind)
        .key(settings.key)
        .callback_url(settings.callback_url)
        .user_info_mapping(settings.user_info_mapping)
        .timeout(timeout);
    builder.secret = settings.secret;

    if let Some(scope) = settings.scope {
        builder = builder.scope(scope);
    }
    if let Some(site) = settings.site {
        builder = builder.site(site);
    }
    if let Some(path) = settings.auth_path {
        builder = builder.auth_path(path);
    }
    if let Some(url) = settings.token_url {
        builder = builder.token_url(url);
    }
    if let Some(url) = settings.user_info_url {
        builder = builder.user_info_url(url);
    }
    if let Some(version) = settings.api_version {
        builder = builder.api_version(version);
    }
    if let Some(display) = settings.display {
        builder = builder.display(display);
    }
    if let Some(url) = settings.jwks_url {
        builder = builder.jwks_url(url);
    }
    if let Some(issuer) = settings.issuer {
        builder = builder.issuer(issuer);
    }

    builder.build()
}

/// Create a new engine configuration builder.
pub fn external_auth_config() -> ExternalAuthConfigBuilder {
    ExternalAuthConfigBuilder::new()
}
