//! OpenID Connect Flow
//!
//! Authorization-code grant whose token response carries an id token. The
//! id token is validated (signature, audience, issuer, expiry) and its
//! claims stand in for a user-info payload.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::HttpTransport;
use crate::error::{ExternalAuthError, ProtocolError, TokenExchangeError};
use crate::flows::oauth2::{identity_from_payload, request_token};
use crate::flows::{ProviderFlow, QueryParam};
use crate::types::{AccessToken, ExternalIdentity, ProviderConfig};

/// OpenID Connect providers.
#[derive(Clone, Copy, Debug, Default)]
pub struct OidcFlow;

#[async_trait]
impl ProviderFlow for OidcFlow {
    fn authorize_params(
        &self,
        provider: &ProviderConfig,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Vec<QueryParam> {
        let mut params = vec![
            ("client_id", Some(provider.key.clone())),
            ("redirect_uri", Some(redirect_uri.to_string())),
            ("response_type", Some("code".to_string())),
        ];
        if let Some(scope) = &provider.scope {
            params.push(("scope", Some(scope.clone())));
        }
        if let Some(state) = state {
            params.push(("state", Some(state.to_string())));
        }
        params
    }

    async fn exchange_token(
        &self,
        provider: &ProviderConfig,
        transport: &dyn HttpTransport,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, ExternalAuthError> {
        let response = request_token(provider, transport, code, redirect_uri).await?;
        let id_token = response
            .id_token
            .clone()
            .ok_or_else(|| ProtocolError::MissingField {
                field: "id_token".to_string(),
            })?;

        let claims = validate_id_token(provider, transport, &id_token).await?;
        tracing::debug!(provider = %provider.kind, "id token validated");

        let mut token = AccessToken::from_response(response);
        token.id_token_claims = Some(claims);
        Ok(token)
    }

    async fn fetch_identity(
        &self,
        provider: &ProviderConfig,
        _transport: &dyn HttpTransport,
        token: &AccessToken,
    ) -> Result<ExternalIdentity, ExternalAuthError> {
        let claims = token
            .id_token_claims
            .clone()
            .ok_or_else(|| invalid_id_token("token carries no validated id token"))?;
        identity_from_payload(provider.kind, Value::Object(claims))
    }
}

fn invalid_id_token(message: impl Into<String>) -> TokenExchangeError {
    TokenExchangeError::InvalidIdToken {
        message: message.into(),
    }
}

#[cfg(feature = "jwt")]
async fn validate_id_token(
    provider: &ProviderConfig,
    transport: &dyn HttpTransport,
    id_token: &str,
) -> Result<Map<String, Value>, ExternalAuthError> {
    use jsonwebtoken::{
        decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation,
    };
    use secrecy::ExposeSecret;

    let header = decode_header(id_token).map_err(|e| invalid_id_token(e.to_string()))?;

    let key = match header.alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            DecodingKey::from_secret(provider.secret.expose_secret().as_bytes())
        }
        _ => {
            let jwks = fetch_jwks(provider, transport).await?;
            let jwk = match header.kid.as_deref() {
                Some(kid) => jwks.find(kid),
                None => jwks.keys.first(),
            }
            .ok_or_else(|| invalid_id_token("no matching signing key"))?;
            DecodingKey::from_jwk(jwk).map_err(|e| invalid_id_token(e.to_string()))?
        }
    };

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[provider.key.as_str()]);
    if let Some(issuer) = &provider.issuer {
        validation.set_issuer(&[issuer.as_str()]);
    }

    let data = decode::<Map<String, Value>>(id_token, &key, &validation).map_err(|e| {
        tracing::warn!(provider = %provider.kind, error = %e, "id token rejected");
        match e.kind() {
            ErrorKind::ExpiredSignature => invalid_id_token("id token expired"),
            ErrorKind::InvalidAudience => invalid_id_token("id token audience mismatch"),
            ErrorKind::InvalidIssuer => invalid_id_token("id token issuer mismatch"),
            _ => invalid_id_token(e.to_string()),
        }
    })?;

    Ok(data.claims)
}

#[cfg(feature = "jwt")]
async fn fetch_jwks(
    provider: &ProviderConfig,
    transport: &dyn HttpTransport,
) -> Result<jsonwebtoken::jwk::JwkSet, ExternalAuthError> {
    use crate::core::HttpRequest;
    use crate::error::{create_error_from_response, ConfigurationError};

    let url = provider
        .jwks_url
        .as_deref()
        .ok_or_else(|| ConfigurationError::MissingField {
            provider: provider.kind.to_string(),
            field: "jwks_url".to_string(),
        })?;

    let response = transport
        .send(HttpRequest::get(url).timeout(provider.timeout))
        .await?;
    if !response.is_success() {
        return Err(create_error_from_response(response.status, &response.body));
    }

    serde_json::from_str(&response.body).map_err(|e| {
        ProtocolError::InvalidResponse {
            message: format!("invalid JWKS document: {}", e),
        }
        .into()
    })
}

#[cfg(not(feature = "jwt"))]
async fn validate_id_token(
    _provider: &ProviderConfig,
    _transport: &dyn HttpTransport,
    _id_token: &str,
) -> Result<Map<String, Value>, ExternalAuthError> {
    Err(invalid_id_token("id token validation requires the `jwt` feature").into())
}
