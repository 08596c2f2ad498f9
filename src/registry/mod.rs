//! Provider Registry
//!
//! Maps provider names to their immutable configuration. Built once at
//! startup and shared read-only.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::types::config::is_absolute;
use crate::types::{ExternalAuthConfig, ProtocolVariant, ProviderConfig, ProviderKind};

/// Registry of enabled providers.
#[derive(Clone, Debug)]
pub struct ProviderRegistry {
    providers: Arc<HashMap<ProviderKind, ProviderConfig>>,
}

impl ProviderRegistry {
    /// Validate the enabled providers of `config` and index them.
    pub fn from_config(config: &ExternalAuthConfig) -> Result<Self, ConfigurationError> {
        let mut providers = HashMap::new();

        for kind in &config.external_providers {
            let provider = config
                .providers
                .iter()
                .find(|p| p.kind == *kind)
                .ok_or_else(|| ConfigurationError::MissingField {
                    provider: kind.to_string(),
                    field: "configuration".to_string(),
                })?;
            validate(provider)?;
            providers.insert(*kind, provider.clone());
        }

        tracing::debug!(count = providers.len(), "provider registry loaded");
        Ok(Self {
            providers: Arc::new(providers),
        })
    }

    /// Look up an enabled provider by name.
    pub fn config_for(&self, name: &str) -> Result<&ProviderConfig, ConfigurationError> {
        let unknown = || ConfigurationError::UnknownProvider {
            name: name.to_string(),
        };
        let kind: ProviderKind = name.parse().map_err(|_| unknown())?;
        self.get(kind).ok_or_else(unknown)
    }

    /// Look up an enabled provider by kind.
    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(&kind)
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Enabled providers, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.providers.keys().copied()
    }
}

fn validate(provider: &ProviderConfig) -> Result<(), ConfigurationError> {
    let missing = |field: &str| ConfigurationError::MissingField {
        provider: provider.kind.to_string(),
        field: field.to_string(),
    };

    if provider.key.is_empty() {
        return Err(missing("key"));
    }
    if provider.callback_url.is_empty() {
        return Err(missing("callback_url"));
    }

    if provider.kind.protocol() == ProtocolVariant::OpenIdConnect {
        let endpoints = [
            ("auth_path", &provider.auth_path),
            ("token_url", &provider.token_url),
        ];
        for (field, url) in endpoints {
            if url.is_empty() {
                return Err(missing(field));
            }
            if !is_absolute(url) {
                return Err(ConfigurationError::InvalidEndpoint { url: url.clone() });
            }
        }
    }

    for endpoint in [provider.authorize_endpoint(), provider.token_endpoint()] {
        url::Url::parse(&endpoint).map_err(|_| ConfigurationError::InvalidEndpoint {
            url: endpoint.clone(),
        })?;
    }

    Ok(())
}
