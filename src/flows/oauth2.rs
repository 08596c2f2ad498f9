//! OAuth2 Flow
//!
//! Authorization-code grant (RFC 6749 Section 4.1) followed by a user-info
//! call whose shape depends on the provider.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use url::Url;

use crate::core::{HttpRequest, HttpTransport};
use crate::error::{
    create_error_from_response, ConfigurationError, ExternalAuthError, ProtocolError,
};
use crate::flows::{ProviderFlow, QueryParam};
use crate::types::{
    form_fields, AccessToken, ExternalIdentity, ProviderConfig, ProviderKind, TokenPlacement,
    TokenResponse,
};

const USER_AGENT: &str = concat!("external-auth/", env!("CARGO_PKG_VERSION"));

/// Plain OAuth2 providers.
#[derive(Clone, Copy, Debug, Default)]
pub struct OAuth2Flow;

#[async_trait]
impl ProviderFlow for OAuth2Flow {
    fn authorize_params(
        &self,
        provider: &ProviderConfig,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Vec<QueryParam> {
        vec![
            ("client_id", Some(provider.key.clone())),
            ("display", provider.display.clone()),
            ("redirect_uri", Some(redirect_uri.to_string())),
            ("response_type", Some("code".to_string())),
            ("scope", provider.scope.clone()),
            ("state", state.map(str::to_string)),
        ]
    }

    async fn exchange_token(
        &self,
        provider: &ProviderConfig,
        transport: &dyn HttpTransport,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, ExternalAuthError> {
        let response = request_token(provider, transport, code, redirect_uri).await?;
        Ok(AccessToken::from_response(response))
    }

    async fn fetch_identity(
        &self,
        provider: &ProviderConfig,
        transport: &dyn HttpTransport,
        token: &AccessToken,
    ) -> Result<ExternalIdentity, ExternalAuthError> {
        let payload = match provider.kind {
            ProviderKind::Vk => fetch_vk_profile(provider, transport, token).await?,
            ProviderKind::Salesforce => {
                let url = token.param("id").ok_or_else(|| ProtocolError::MissingField {
                    field: "id".to_string(),
                })?;
                get_json(transport, provider, with_bearer(HttpRequest::get(url), token)).await?
            }
            _ => {
                let url = user_info_url(provider)?;
                let request = match provider.kind.defaults().token_placement {
                    TokenPlacement::QueryParam => {
                        HttpRequest::get(with_query(&url, &[("access_token", token.secret())])?)
                    }
                    TokenPlacement::BearerHeader => with_bearer(HttpRequest::get(url), token),
                };
                get_json(transport, provider, request).await?
            }
        };

        identity_from_payload(provider.kind, payload)
    }
}

/// POST the authorization code to the token endpoint.
///
/// Accepts JSON and form-encoded answers; an `error` field in a successful
/// response is still a provider error.
#[tracing::instrument(skip_all, fields(provider = %provider.kind))]
pub(crate) async fn request_token(
    provider: &ProviderConfig,
    transport: &dyn HttpTransport,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, ExternalAuthError> {
    let request = HttpRequest::post_form(
        provider.token_endpoint(),
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", provider.key.as_str()),
            ("client_secret", provider.secret.expose_secret()),
        ],
    )
    .header("Accept", "application/json")
    .header("User-Agent", USER_AGENT)
    .timeout(provider.timeout);

    let response = transport.send(request).await?;
    if !response.is_success() {
        tracing::warn!(status = response.status, "token endpoint rejected the code");
        return Err(create_error_from_response(response.status, &response.body));
    }

    let fields = if response.is_json() || response.body.trim_start().starts_with('{') {
        match serde_json::from_str::<Value>(&response.body) {
            Ok(Value::Object(fields)) => fields,
            _ => {
                return Err(ProtocolError::InvalidResponse {
                    message: "token response is not a JSON object".to_string(),
                }
                .into())
            }
        }
    } else {
        form_fields(&response.body)
    };

    if fields.contains_key("error") {
        tracing::warn!("token endpoint returned an error payload");
        return Err(create_error_from_response(
            400,
            &Value::Object(error_fields(&fields)).to_string(),
        ));
    }
    if !matches!(fields.get("access_token"), Some(Value::String(t)) if !t.is_empty()) {
        return Err(ProtocolError::MissingField {
            field: "access_token".to_string(),
        }
        .into());
    }

    tracing::debug!("authorization code redeemed");
    TokenResponse::from_fields(fields).map_err(|e| {
        ProtocolError::InvalidResponse {
            message: e.to_string(),
        }
        .into()
    })
}

fn error_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(k, _)| *k == "error" || *k == "error_description")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

async fn fetch_vk_profile(
    provider: &ProviderConfig,
    transport: &dyn HttpTransport,
    token: &AccessToken,
) -> Result<Value, ExternalAuthError> {
    let user_id = token.param("user_id").ok_or_else(|| ProtocolError::MissingField {
        field: "user_id".to_string(),
    })?;
    let fields = provider.user_info_mapping.source_fields().join(",");
    let url = with_query(
        &user_info_url(provider)?,
        &[
            ("uids", user_id.as_str()),
            ("fields", fields.as_str()),
            ("access_token", token.secret()),
        ],
    )?;

    let body = get_json(transport, provider, HttpRequest::get(url)).await?;
    let mut profile = body
        .pointer("/response/0")
        .cloned()
        .ok_or_else(|| ProtocolError::MissingField {
            field: "response".to_string(),
        })?;

    // VK hands out the email with the token, not with the profile.
    if let (Some(email), Value::Object(profile)) = (token.param("email"), &mut profile) {
        profile.insert("email".to_string(), Value::String(email));
    }
    Ok(profile)
}

fn user_info_url(provider: &ProviderConfig) -> Result<String, ConfigurationError> {
    provider
        .user_info_endpoint()
        .ok_or_else(|| ConfigurationError::MissingField {
            provider: provider.kind.to_string(),
            field: "user_info_url".to_string(),
        })
}

fn with_query(url: &str, params: &[(&str, &str)]) -> Result<String, ConfigurationError> {
    let mut url = Url::parse(url).map_err(|_| ConfigurationError::InvalidEndpoint {
        url: url.to_string(),
    })?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url.into())
}

fn with_bearer(request: HttpRequest, token: &AccessToken) -> HttpRequest {
    request.header("Authorization", token.authorization_header())
}

#[tracing::instrument(skip_all, fields(provider = %provider.kind))]
async fn get_json(
    transport: &dyn HttpTransport,
    provider: &ProviderConfig,
    request: HttpRequest,
) -> Result<Value, ExternalAuthError> {
    let request = request
        .header("Accept", "application/json")
        .header("User-Agent", USER_AGENT)
        .timeout(provider.timeout);

    let response = transport.send(request).await?;
    if !response.is_success() {
        tracing::warn!(status = response.status, "user info request failed");
        return Err(create_error_from_response(response.status, &response.body));
    }

    serde_json::from_str(&response.body).map_err(|e| {
        ProtocolError::InvalidResponse {
            message: format!("user info is not JSON: {}", e),
        }
        .into()
    })
}

/// Take the external uid out of a user-info payload.
pub(crate) fn identity_from_payload(
    kind: ProviderKind,
    payload: Value,
) -> Result<ExternalIdentity, ExternalAuthError> {
    let Value::Object(attributes) = payload else {
        return Err(ProtocolError::InvalidResponse {
            message: "user info is not a JSON object".to_string(),
        }
        .into());
    };

    let field = kind.defaults().uid_field;
    let uid = match attributes.get(field) {
        Some(Value::String(uid)) if !uid.is_empty() => uid.clone(),
        Some(Value::Number(uid)) => uid.to_string(),
        _ => {
            return Err(ProtocolError::MissingField {
                field: field.to_string(),
            }
            .into())
        }
    };

    Ok(ExternalIdentity::new(kind, uid, attributes))
}
