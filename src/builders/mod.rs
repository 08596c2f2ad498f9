//! Builders
//!
//! Fluent builders for provider and engine configuration.

pub mod config;

pub use config::{external_auth_config, ExternalAuthConfigBuilder, ProviderConfigBuilder};
