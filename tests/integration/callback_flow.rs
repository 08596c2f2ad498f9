//! Callback handling against a mock provider: exchange, user info, login
//! and account creation.

use std::time::Duration;

use external_auth::{
    AccountError, AuthorizationError, AuthorizeOptions, CallbackParams, ExternalAuthConfigBuilder,
    ExternalAuthError, MissingAccountPolicy, ProviderKind, RequestContext, RequestOrigin,
    SessionId, SessionStore, User,
};
use serde_json::{json, Map, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{harness, mocked_provider, mount_oauth2_provider, oauth2_config, OAUTH2_PROVIDERS};

fn origin() -> RequestOrigin {
    RequestOrigin::new("http", "test.host")
}

fn code_callback() -> CallbackParams {
    CallbackParams::with_code("4/AmNLSmF9Ilr5yCXcmJGGE1uz6bPi", None)
}

fn existing_user(kind: ProviderKind) -> User {
    User::external(format!("existing-{}", kind), kind, "123", Map::new())
}

#[tokio::test]
async fn test_login_from_existing_user_for_each_provider() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    let origin = origin();

    for kind in OAUTH2_PROVIDERS {
        h.accounts.insert_user(existing_user(kind));
        let sid = SessionId::new(format!("browser-{}", kind));

        let redirect = h
            .client
            .handle_callback(
                kind.as_str(),
                RequestContext::new(&sid, &origin),
                &code_callback(),
                MissingAccountPolicy::Reject,
            )
            .await;

        assert_eq!(redirect.location, "/", "provider {}", kind);
        assert_eq!(redirect.notice(), Some("Success!"), "provider {}", kind);
        let session = h.sessions.session(&sid).await.unwrap().expect("logged in");
        assert_eq!(session.user_id, format!("existing-{}", kind));
    }

    let lookups = h.accounts.get_lookup_history();
    assert_eq!(lookups.len(), OAUTH2_PROVIDERS.len());
    assert!(lookups.iter().all(|(_, uid)| uid == "123"));
}

#[tokio::test]
async fn test_unknown_user_fails_without_session() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    let sid = SessionId::new("browser");
    let origin = origin();

    let redirect = h
        .client
        .handle_callback(
            "github",
            RequestContext::new(&sid, &origin),
            &code_callback(),
            MissingAccountPolicy::Reject,
        )
        .await;

    assert_eq!(redirect.alert(), Some("Failed!"));
    assert!(h.sessions.session(&sid).await.unwrap().is_none());

    let err = h
        .client
        .login_from_callback(
            "github",
            RequestContext::new(&sid, &origin),
            &code_callback(),
            MissingAccountPolicy::Reject,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExternalAuthError::Account(AccountError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_redirects_to_remembered_url() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    h.accounts.insert_user(existing_user(ProviderKind::Facebook));
    let sid = SessionId::new("browser");
    let origin = origin();
    h.sessions.set_return_to(&sid, "fuu".to_string()).await.unwrap();

    let redirect = h
        .client
        .handle_callback(
            "facebook",
            RequestContext::new(&sid, &origin),
            &code_callback(),
            MissingAccountPolicy::Reject,
        )
        .await;

    assert_eq!(redirect.location, "fuu");
    assert_eq!(redirect.notice(), Some("Success!"));
}

#[tokio::test]
async fn test_exchange_posts_code_and_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .and(body_string_contains("client_id=eYVNBjBDi33aa9GkA3w"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!(
                "access_token={}&expires=5183999",
                super::ACCESS_TOKEN
            )),
        )
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(oauth2_config(&server).build().unwrap());
    let sid = SessionId::new("browser");
    let origin = origin();

    let token = h
        .client
        .exchange("facebook", RequestContext::new(&sid, &origin), "the-code", None)
        .await
        .unwrap();

    assert_eq!(token.secret(), super::ACCESS_TOKEN);
}

async fn create_from_callback(mapping: &[(&str, &str)]) -> Map<String, Value> {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let provider = mapping
        .iter()
        .fold(mocked_provider(ProviderKind::Facebook, &server), |builder, (target, source)| {
            builder.map(*target, source)
        })
        .build();
    let h = harness(oauth2_config(&server).provider(provider).build().unwrap());
    let sid = SessionId::new("browser");
    let origin = origin();

    let user = h
        .client
        .login_from_callback(
            "facebook",
            RequestContext::new(&sid, &origin),
            &code_callback(),
            MissingAccountPolicy::Create,
        )
        .await
        .unwrap();

    let history = h.accounts.get_create_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].0, ProviderKind::Facebook);
    assert_eq!(history[0].1, "123");
    assert!(user.is_external());
    assert!(h.sessions.session(&sid).await.unwrap().is_some());
    history[0].2.clone()
}

#[tokio::test]
async fn test_create_from_maps_top_level_field() {
    let attributes = create_from_callback(&[("username", "name")]).await;
    assert_eq!(Value::Object(attributes), json!({"username": "Noam Ben Ari"}));
}

#[tokio::test]
async fn test_create_from_maps_nested_field() {
    let attributes = create_from_callback(&[("username", "hometown/name")]).await;
    assert_eq!(Value::Object(attributes), json!({"username": "Haifa, Israel"}));
}

#[tokio::test]
async fn test_create_from_drops_missing_field() {
    let attributes =
        create_from_callback(&[("username", "name"), ("created_at", "does/not/exist")]).await;
    assert_eq!(Value::Object(attributes), json!({"username": "Noam Ben Ari"}));
}

#[tokio::test]
async fn test_rejecting_completion_block_creates_nothing() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let provider = mocked_provider(ProviderKind::Facebook, &server)
        .map("username", "name")
        .build();
    let h = harness(oauth2_config(&server).provider(provider).build().unwrap());
    h.accounts.insert_user(User {
        attributes: json!({"username": "Noam Ben Ari"})
            .as_object()
            .cloned()
            .unwrap(),
        ..User::local("local-1")
    });
    let sid = SessionId::new("browser");
    let origin = origin();

    let token = h
        .client
        .exchange("facebook", RequestContext::new(&sid, &origin), "code", None)
        .await
        .unwrap();
    let identity = h.client.fetch_identity("facebook", &token).await.unwrap();

    let accounts = h.accounts.clone();
    let unique_username = move |user: &User| -> Result<(), AccountError> {
        let taken = accounts
            .user("local-1")
            .map(|existing| existing.attribute("username") == user.attribute("username"))
            .unwrap_or(false);
        if taken {
            Err(AccountError::Rejected {
                reason: "username has already been taken".to_string(),
            })
        } else {
            Ok(())
        }
    };

    let err = h
        .client
        .create_from(&identity, Some(&unique_username))
        .await
        .unwrap_err();

    assert!(matches!(err, ExternalAuthError::Account(AccountError::Rejected { .. })));
    assert_eq!(h.accounts.user_count(), 1);
    assert!(h.accounts.authentication_records().is_empty());
}

#[tokio::test]
async fn test_token_endpoint_rejection_fails_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed"
        })))
        .mount(&server)
        .await;
    let h = harness(oauth2_config(&server).build().unwrap());
    h.accounts.insert_user(existing_user(ProviderKind::Github));
    let sid = SessionId::new("browser");
    let origin = origin();

    let err = h
        .client
        .login_from_callback(
            "github",
            RequestContext::new(&sid, &origin),
            &code_callback(),
            MissingAccountPolicy::Reject,
        )
        .await
        .unwrap_err();
    assert!(err.is_token_exchange_failure());

    let redirect = h
        .client
        .handle_callback(
            "github",
            RequestContext::new(&sid, &origin),
            &code_callback(),
            MissingAccountPolicy::Reject,
        )
        .await;
    assert_eq!(redirect.alert(), Some("Failed!"));
    assert!(h.sessions.session(&sid).await.unwrap().is_none());
    assert!(h.accounts.get_lookup_history().is_empty());
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let provider = mocked_provider(ProviderKind::Github, &server)
        .timeout(Duration::from_millis(200))
        .build();
    let h = harness(oauth2_config(&server).provider(provider).build().unwrap());
    let sid = SessionId::new("browser");
    let origin = origin();

    let err = h
        .client
        .exchange("github", RequestContext::new(&sid, &origin), "code", None)
        .await
        .unwrap_err();

    assert!(err.is_token_exchange_failure());
}

#[tokio::test]
async fn test_forged_state_never_reaches_provider() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    h.accounts.insert_user(existing_user(ProviderKind::Github));
    let sid = SessionId::new("browser");
    let origin = origin();
    let request = RequestContext::new(&sid, &origin);

    let url = h
        .client
        .login_at("github", request, &AuthorizeOptions::generate_state())
        .await
        .unwrap();
    assert!(url.state.is_some());

    let forged = CallbackParams::with_code("code", Some("forged".to_string()));
    let redirect = h
        .client
        .handle_callback("github", request, &forged, MissingAccountPolicy::Reject)
        .await;

    assert_eq!(redirect.alert(), Some("Failed!"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert!(!h.sessions.has_pending_state(&sid));
}

#[tokio::test]
async fn test_issued_state_round_trip() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    h.accounts.insert_user(existing_user(ProviderKind::Google));
    let sid = SessionId::new("browser");
    let origin = origin();
    let request = RequestContext::new(&sid, &origin).with_ip_address("10.0.0.7");

    let url = h
        .client
        .login_at("google", request, &AuthorizeOptions::generate_state())
        .await
        .unwrap();
    let callback = CallbackParams::with_code("code", url.state);

    let redirect = h
        .client
        .handle_callback("google", request, &callback, MissingAccountPolicy::Reject)
        .await;

    assert_eq!(redirect.notice(), Some("Success!"));
    let user = h.accounts.user("existing-google").unwrap();
    assert_eq!(user.last_login_from_ip_address.as_deref(), Some("10.0.0.7"));
}

#[tokio::test]
async fn test_provider_denial_consumes_state() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    let sid = SessionId::new("browser");
    let origin = origin();
    let request = RequestContext::new(&sid, &origin);

    h.client
        .login_at("vk", request, &AuthorizeOptions::with_state("bla"))
        .await
        .unwrap();
    let denied = CallbackParams::from_url_str(
        "http://blabla.com/?error=access_denied&error_description=User+denied+access&state=bla",
    )
    .unwrap();

    let err = h
        .client
        .login_from_callback("vk", request, &denied, MissingAccountPolicy::Reject)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "EXTAUTH_AUTH");
    assert!(!h.sessions.has_pending_state(&sid));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_replayed_callback_is_rejected() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    h.accounts.insert_user(existing_user(ProviderKind::Github));
    let sid = SessionId::new("browser");
    let origin = origin();
    let request = RequestContext::new(&sid, &origin);

    let url = h
        .client
        .login_at("github", request, &AuthorizeOptions::generate_state())
        .await
        .unwrap();
    let callback = CallbackParams::with_code("code", url.state);

    let first = h
        .client
        .handle_callback("github", request, &callback, MissingAccountPolicy::Reject)
        .await;
    assert_eq!(first.notice(), Some("Success!"));
    let token_calls = server.received_requests().await.unwrap_or_default().len();

    let err = h
        .client
        .login_from_callback("github", request, &callback, MissingAccountPolicy::Reject)
        .await
        .unwrap_err();
    assert!(err.is_state_failure());

    let replay = h
        .client
        .handle_callback("github", request, &callback, MissingAccountPolicy::Reject)
        .await;
    assert_eq!(replay.alert(), Some("Failed!"));
    assert_eq!(
        server.received_requests().await.unwrap_or_default().len(),
        token_calls
    );
}

#[tokio::test]
async fn test_racing_exchanges_share_one_state() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    let sid = SessionId::new("browser");
    let origin = origin();
    let request = RequestContext::new(&sid, &origin);

    let nonce = h
        .client
        .login_at("facebook", request, &AuthorizeOptions::generate_state())
        .await
        .unwrap()
        .state
        .expect("state issued");

    let (a, b) = futures::join!(
        h.client.exchange("facebook", request, "code", Some(&nonce)),
        h.client.exchange("facebook", request, "code", Some(&nonce)),
    );
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);

    let later = h
        .client
        .exchange("facebook", request, "code", Some(&nonce))
        .await
        .unwrap_err();
    assert!(later.is_state_failure());
}

#[tokio::test]
async fn test_callback_without_code_spends_state() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(oauth2_config(&server).build().unwrap());
    h.accounts.insert_user(existing_user(ProviderKind::Google));
    let sid = SessionId::new("browser");
    let origin = origin();
    let request = RequestContext::new(&sid, &origin);

    let nonce = h
        .client
        .login_at("google", request, &AuthorizeOptions::generate_state())
        .await
        .unwrap()
        .state
        .expect("state issued");
    let without_code = CallbackParams {
        state: Some(nonce.clone()),
        ..Default::default()
    };

    let err = h
        .client
        .login_from_callback(
            "google",
            request,
            &without_code,
            MissingAccountPolicy::Reject,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExternalAuthError::Authorization(AuthorizationError::MissingCode)
    ));
    assert!(!h.sessions.has_pending_state(&sid));

    let replay = h
        .client
        .handle_callback(
            "google",
            request,
            &CallbackParams::with_code("code", Some(nonce)),
            MissingAccountPolicy::Reject,
        )
        .await;
    assert_eq!(replay.alert(), Some("Failed!"));
    assert!(h.sessions.session(&sid).await.unwrap().is_none());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_failure_alert_defaults_to_user_message() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let config = OAUTH2_PROVIDERS
        .iter()
        .fold(ExternalAuthConfigBuilder::new(), |builder, kind| {
            builder
                .provider(mocked_provider(*kind, &server).build())
                .enable(*kind)
        })
        .build()
        .unwrap();
    let h = harness(config);
    let sid = SessionId::new("browser");
    let origin = origin();
    let request = RequestContext::new(&sid, &origin);

    let disabled = h
        .client
        .handle_callback("paypal", request, &code_callback(), MissingAccountPolicy::Reject)
        .await;
    assert_eq!(disabled.alert(), Some("This sign-in method is not available."));

    let unknown_user = h
        .client
        .handle_callback("github", request, &code_callback(), MissingAccountPolicy::Reject)
        .await;
    assert_eq!(
        unknown_user.alert(),
        Some("Signing in with the external provider failed. Please try again.")
    );
}
