//! User Types
//!
//! The local account record as seen by the authentication core.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::types::ProviderKind;

/// How the account came to exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserOrigin {
    /// Registered locally (password, invitation, ...).
    Local,
    /// Created from an external identity.
    External {
        provider: ProviderKind,
        external_uid: String,
    },
}

/// Activation lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationState {
    Pending,
    Active,
}

/// Local user account.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub origin: UserOrigin,
    /// Mapped profile attributes.
    pub attributes: Map<String, Value>,
    pub activation_state: ActivationState,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_logout_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub last_login_from_ip_address: Option<String>,
}

impl User {
    /// A locally registered user awaiting activation.
    pub fn local(id: impl Into<String>) -> Self {
        Self::with_origin(id, UserOrigin::Local, Map::new())
    }

    /// A user created from an external identity.
    pub fn external(
        id: impl Into<String>,
        provider: ProviderKind,
        external_uid: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self::with_origin(
            id,
            UserOrigin::External {
                provider,
                external_uid: external_uid.into(),
            },
            attributes,
        )
    }

    fn with_origin(
        id: impl Into<String>,
        origin: UserOrigin,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            origin,
            attributes,
            activation_state: ActivationState::Pending,
            last_login_at: None,
            last_logout_at: None,
            last_activity_at: None,
            last_login_from_ip_address: None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.origin, UserOrigin::External { .. })
    }

    pub fn is_active(&self) -> bool {
        self.activation_state == ActivationState::Active
    }

    /// Mapped attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Activity facts the engine asks the account store to record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivityRecord {
    Login(DateTime<Utc>),
    Logout(DateTime<Utc>),
    LastActivity(DateTime<Utc>),
    LoginIp(String),
}
