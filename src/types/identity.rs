//! Identity Types
//!
//! What a provider says about the user, and the persisted link to a local account.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ProviderKind;

/// A user as known to an external provider. Transient.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalIdentity {
    pub provider: ProviderKind,
    pub external_uid: String,
    /// Decoded user-info payload or id-token claims.
    pub raw_attributes: Map<String, Value>,
}

impl ExternalIdentity {
    pub fn new(
        provider: ProviderKind,
        external_uid: impl Into<String>,
        raw_attributes: Map<String, Value>,
    ) -> Self {
        Self {
            provider,
            external_uid: external_uid.into(),
            raw_attributes,
        }
    }
}

/// Persisted link between a local user and an external identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthenticationRecord {
    pub user_id: String,
    pub provider: ProviderKind,
    pub external_uid: String,
}
