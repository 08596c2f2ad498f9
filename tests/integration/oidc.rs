//! OpenID Connect login with an HS256-signed id token.

use external_auth::{
    CallbackParams, ExternalAuthConfigBuilder, MissingAccountPolicy, ProviderKind, RequestContext,
    RequestOrigin, SessionId, User,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Map};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{fixture_provider, harness, Harness, OIDC_KEY, OIDC_SECRET};

fn signed_id_token(secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    encode(
        &Header::default(),
        &json!({
            "iss": "accounts.google.com",
            "aud": OIDC_KEY,
            "azp": OIDC_KEY,
            "sub": "123",
            "email": "nbenari@gmail.com",
            "iat": now,
            "exp": now + 3600,
        }),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn oidc_provider(id_token: String) -> (Harness, MockServer) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/o/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access_token_key",
            "token_type": "Bearer",
            "expires_in": 3599,
            "id_token": id_token,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = fixture_provider(ProviderKind::OpenIdConnect)
        .token_url(format!("{}/o/oauth2/token", server.uri()))
        .issuer("accounts.google.com")
        .map("email", "email")
        .build();
    let config = ExternalAuthConfigBuilder::new()
        .provider(provider)
        .enable(ProviderKind::OpenIdConnect)
        .success_notice("Success!")
        .failure_alert("Failed!")
        .build()
        .unwrap();

    (harness(config), server)
}

#[tokio::test]
async fn test_login_with_valid_id_token() {
    let (h, _server) = oidc_provider(signed_id_token(OIDC_SECRET)).await;
    h.accounts.insert_user(User::external(
        "7",
        ProviderKind::OpenIdConnect,
        "123",
        Map::new(),
    ));
    let sid = SessionId::new("browser");
    let origin = RequestOrigin::new("http", "test.host");

    let redirect = h
        .client
        .handle_callback(
            "openid_connect",
            RequestContext::new(&sid, &origin),
            &CallbackParams::with_code("code", None),
            MissingAccountPolicy::Reject,
        )
        .await;

    assert_eq!(redirect.notice(), Some("Success!"));
    assert_eq!(
        h.accounts.get_lookup_history(),
        vec![(ProviderKind::OpenIdConnect, "123".to_string())]
    );
}

#[tokio::test]
async fn test_claims_feed_the_attribute_mapping() {
    let (h, _server) = oidc_provider(signed_id_token(OIDC_SECRET)).await;
    let sid = SessionId::new("browser");
    let origin = RequestOrigin::new("http", "test.host");

    let user = h
        .client
        .login_from_callback(
            "openid_connect",
            RequestContext::new(&sid, &origin),
            &CallbackParams::with_code("code", None),
            MissingAccountPolicy::Create,
        )
        .await
        .unwrap();

    assert_eq!(user.attribute("email"), Some(&json!("nbenari@gmail.com")));
}

#[tokio::test]
async fn test_forged_signature_fails_login() {
    let (h, _server) = oidc_provider(signed_id_token("not-the-client-secret")).await;
    h.accounts.insert_user(User::external(
        "7",
        ProviderKind::OpenIdConnect,
        "123",
        Map::new(),
    ));
    let sid = SessionId::new("browser");
    let origin = RequestOrigin::new("http", "test.host");

    let redirect = h
        .client
        .handle_callback(
            "openid_connect",
            RequestContext::new(&sid, &origin),
            &CallbackParams::with_code("code", None),
            MissingAccountPolicy::Reject,
        )
        .await;

    assert_eq!(redirect.alert(), Some("Failed!"));
    assert!(h.accounts.get_lookup_history().is_empty());
}
