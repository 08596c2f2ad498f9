//! Provider Types
//!
//! The closed set of supported identity providers and their protocol defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Supported identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Facebook,
    Github,
    Google,
    #[serde(rename = "liveid")]
    LiveId,
    Vk,
    Salesforce,
    Paypal,
    OpenIdConnect,
}

/// Protocol variant spoken by a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// Plain OAuth2 authorization-code grant plus a user-info call.
    OAuth2,
    /// Authorization-code grant returning a validated id token.
    OpenIdConnect,
}

/// How the access token is presented to the user-info endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>`.
    BearerHeader,
    /// `?access_token=<token>`.
    QueryParam,
}

/// Static protocol parameters of a provider.
#[derive(Clone, Copy, Debug)]
pub struct ProviderDefaults {
    /// Base URL relative token and user-info paths resolve against.
    pub site: &'static str,
    /// Base URL for the authorize path when it differs from `site`.
    pub authorize_site: Option<&'static str>,
    pub auth_path: &'static str,
    pub token_url: &'static str,
    pub user_info_url: &'static str,
    pub scope: Option<&'static str>,
    pub display: Option<&'static str>,
    /// Payload field holding the external uid.
    pub uid_field: &'static str,
    pub token_placement: TokenPlacement,
}

pub const ALL_PROVIDERS: [ProviderKind; 8] = [
    ProviderKind::Facebook,
    ProviderKind::Github,
    ProviderKind::Google,
    ProviderKind::LiveId,
    ProviderKind::Vk,
    ProviderKind::Salesforce,
    ProviderKind::Paypal,
    ProviderKind::OpenIdConnect,
];

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Github => "github",
            Self::Google => "google",
            Self::LiveId => "liveid",
            Self::Vk => "vk",
            Self::Salesforce => "salesforce",
            Self::Paypal => "paypal",
            Self::OpenIdConnect => "openid_connect",
        }
    }

    pub fn protocol(&self) -> ProtocolVariant {
        match self {
            Self::OpenIdConnect => ProtocolVariant::OpenIdConnect,
            _ => ProtocolVariant::OAuth2,
        }
    }

    /// Built-in endpoints and scopes.
    pub fn defaults(&self) -> ProviderDefaults {
        match self {
            Self::Facebook => ProviderDefaults {
                site: "https://graph.facebook.com",
                authorize_site: Some("https://www.facebook.com"),
                auth_path: "/dialog/oauth",
                token_url: "/oauth/access_token",
                user_info_url: "/me",
                scope: Some("email"),
                display: Some("page"),
                uid_field: "id",
                token_placement: TokenPlacement::QueryParam,
            },
            Self::Github => ProviderDefaults {
                site: "https://github.com",
                authorize_site: None,
                auth_path: "/login/oauth/authorize",
                token_url: "/login/oauth/access_token",
                user_info_url: "https://api.github.com/user",
                scope: None,
                display: None,
                uid_field: "id",
                token_placement: TokenPlacement::BearerHeader,
            },
            Self::Google => ProviderDefaults {
                site: "https://accounts.google.com",
                authorize_site: None,
                auth_path: "/o/oauth2/auth",
                token_url: "/o/oauth2/token",
                user_info_url: "https://www.googleapis.com/oauth2/v1/userinfo",
                scope: Some(
                    "https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile",
                ),
                display: None,
                uid_field: "id",
                token_placement: TokenPlacement::BearerHeader,
            },
            Self::LiveId => ProviderDefaults {
                site: "https://oauth.live.com",
                authorize_site: None,
                auth_path: "/authorize",
                token_url: "/token",
                user_info_url: "https://apis.live.net/v5.0/me",
                scope: Some("wl.basic wl.emails wl.offline_access"),
                display: None,
                uid_field: "id",
                token_placement: TokenPlacement::QueryParam,
            },
            Self::Vk => ProviderDefaults {
                site: "https://oauth.vk.com",
                authorize_site: None,
                auth_path: "/authorize",
                token_url: "/access_token",
                user_info_url: "https://api.vk.com/method/getProfiles",
                scope: Some("email"),
                display: None,
                uid_field: "uid",
                token_placement: TokenPlacement::QueryParam,
            },
            Self::Salesforce => ProviderDefaults {
                site: "https://login.salesforce.com",
                authorize_site: None,
                auth_path: "/services/oauth2/authorize",
                token_url: "/services/oauth2/token",
                // Taken from the `id` field of the token response.
                user_info_url: "",
                scope: None,
                display: None,
                uid_field: "user_id",
                token_placement: TokenPlacement::BearerHeader,
            },
            Self::Paypal => ProviderDefaults {
                site: "https://api.paypal.com",
                authorize_site: None,
                auth_path: "https://www.paypal.com/webapps/auth/protocol/openidconnect/v1/authorize",
                token_url: "/v1/identity/openidconnect/tokenservice",
                user_info_url: "https://api.paypal.com/v1/identity/openidconnect/userinfo/?schema=openid",
                scope: Some("openid email"),
                display: None,
                uid_field: "user_id",
                token_placement: TokenPlacement::BearerHeader,
            },
            Self::OpenIdConnect => ProviderDefaults {
                site: "",
                authorize_site: None,
                auth_path: "",
                token_url: "",
                user_info_url: "",
                scope: Some("openid"),
                display: None,
                uid_field: "sub",
                token_placement: TokenPlacement::BearerHeader,
            },
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PROVIDERS
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownProvider {
                name: s.to_string(),
            })
    }
}
