//! Authorize redirect URLs for every built-in provider.

use std::sync::Arc;

use external_auth::{
    AuthorizeOptions, ExternalAuthClient, ExternalAuthConfig, ExternalAuthConfigBuilder,
    ExternalAuthError, InMemoryAccountStore, InMemorySessionStore, MockHttpTransport,
    ProviderConfig, ProviderKind, RequestContext, RequestOrigin, SessionId, ALL_PROVIDERS,
};
use futures::future::join_all;

use super::{fixture_provider, KEY, OIDC_KEY};

type TestClient = ExternalAuthClient<MockHttpTransport, InMemoryAccountStore, InMemorySessionStore>;

fn client_with(providers: Vec<ProviderConfig>) -> TestClient {
    let config: ExternalAuthConfig = providers
        .into_iter()
        .fold(ExternalAuthConfigBuilder::new(), |builder, provider| {
            let kind = provider.kind;
            builder.provider(provider).enable(kind)
        })
        .build()
        .expect("valid config");

    ExternalAuthClient::with_components(
        config,
        MockHttpTransport::new(),
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(InMemorySessionStore::new()),
    )
    .expect("valid client")
}

fn test_host() -> RequestOrigin {
    RequestOrigin::new("http", "test.host")
}

fn facebook_with_relative_callback() -> ProviderConfig {
    fixture_provider(ProviderKind::Facebook)
        .callback_url("/oauth/twitter/callback")
        .build()
}

#[tokio::test]
async fn test_facebook_relative_callback_without_state() {
    let client = client_with(vec![facebook_with_relative_callback()]);
    let sid = SessionId::new("browser");
    let origin = test_host();

    let url = client
        .login_at("facebook", RequestContext::new(&sid, &origin), &AuthorizeOptions::default())
        .await
        .unwrap();

    assert_eq!(
        url.url,
        format!(
            "https://www.facebook.com/dialog/oauth?client_id={}&display=page&redirect_uri=http%3A%2F%2Ftest.host%2Foauth%2Ftwitter%2Fcallback&response_type=code&scope=email&state",
            KEY
        )
    );
    assert_eq!(url.state, None);
}

#[tokio::test]
async fn test_facebook_with_explicit_state() {
    let client = client_with(vec![facebook_with_relative_callback()]);
    let sid = SessionId::new("browser");
    let origin = test_host();

    let url = client
        .login_at(
            "facebook",
            RequestContext::new(&sid, &origin),
            &AuthorizeOptions::with_state("bla"),
        )
        .await
        .unwrap();

    assert_eq!(
        url.url,
        format!(
            "https://www.facebook.com/dialog/oauth?client_id={}&display=page&redirect_uri=http%3A%2F%2Ftest.host%2Foauth%2Ftwitter%2Fcallback&response_type=code&scope=email&state=bla",
            KEY
        )
    );
    assert_eq!(url.state.as_deref(), Some("bla"));
}

#[tokio::test]
async fn test_facebook_graph_api_version() {
    let client = client_with(vec![fixture_provider(ProviderKind::Facebook)
        .callback_url("/oauth/twitter/callback")
        .api_version("v2.2")
        .build()]);
    let sid = SessionId::new("browser");
    let origin = test_host();
    let request = RequestContext::new(&sid, &origin);

    let with_state = client
        .login_at("facebook", request, &AuthorizeOptions::with_state("bla"))
        .await
        .unwrap();
    assert!(with_state
        .url
        .starts_with("https://www.facebook.com/v2.2/dialog/oauth?"));
    assert!(with_state.url.ends_with("&state=bla"));

    // A later login without a state must not reuse the old one.
    let without_state = client
        .login_at("facebook", request, &AuthorizeOptions::default())
        .await
        .unwrap();
    assert_eq!(
        without_state.url,
        format!(
            "https://www.facebook.com/v2.2/dialog/oauth?client_id={}&display=page&redirect_uri=http%3A%2F%2Ftest.host%2Foauth%2Ftwitter%2Fcallback&response_type=code&scope=email&state",
            KEY
        )
    );
}

#[tokio::test]
async fn test_every_provider_authorize_url() {
    let client = client_with(
        ALL_PROVIDERS
            .iter()
            .map(|kind| fixture_provider(*kind).build())
            .collect(),
    );
    let origin = test_host();

    let expected = |kind: ProviderKind| -> String {
        let redirect = "redirect_uri=http%3A%2F%2Fblabla.com&response_type=code";
        match kind {
            ProviderKind::Facebook => format!(
                "https://www.facebook.com/dialog/oauth?client_id={}&display=page&{}&scope=email&state",
                KEY, redirect
            ),
            ProviderKind::Github => format!(
                "https://github.com/login/oauth/authorize?client_id={}&display&{}&scope&state",
                KEY, redirect
            ),
            ProviderKind::Google => format!(
                "https://accounts.google.com/o/oauth2/auth?client_id={}&display&{}&scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fuserinfo.email+https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fuserinfo.profile&state",
                KEY, redirect
            ),
            ProviderKind::LiveId => format!(
                "https://oauth.live.com/authorize?client_id={}&display&{}&scope=wl.basic+wl.emails+wl.offline_access&state",
                KEY, redirect
            ),
            ProviderKind::Vk => format!(
                "https://oauth.vk.com/authorize?client_id={}&display&{}&scope=email&state",
                KEY, redirect
            ),
            ProviderKind::Salesforce => format!(
                "https://login.salesforce.com/services/oauth2/authorize?client_id={}&display&{}&scope&state",
                KEY, redirect
            ),
            ProviderKind::Paypal => format!(
                "https://www.paypal.com/webapps/auth/protocol/openidconnect/v1/authorize?client_id={}&display&{}&scope=openid+email&state",
                KEY, redirect
            ),
            ProviderKind::OpenIdConnect => format!(
                "https://accounts.google.com/o/oauth2/auth?client_id={}&{}&scope=openid",
                OIDC_KEY, redirect
            ),
        }
    };

    let session_ids: Vec<SessionId> = ALL_PROVIDERS
        .iter()
        .map(|kind| SessionId::new(format!("browser-{}", kind)))
        .collect();
    let urls = join_all(ALL_PROVIDERS.iter().zip(&session_ids).map(|(kind, sid)| {
        let client = &client;
        let origin = &origin;
        async move {
            client
                .login_at(
                    kind.as_str(),
                    RequestContext::new(sid, origin),
                    &AuthorizeOptions::default(),
                )
                .await
        }
    }))
    .await;

    for (kind, url) in ALL_PROVIDERS.iter().zip(urls) {
        assert_eq!(url.unwrap().url, expected(*kind), "provider {}", kind);
    }
}

#[tokio::test]
async fn test_generated_state_is_returned_and_embedded() {
    let client = client_with(vec![fixture_provider(ProviderKind::Github).build()]);
    let sid = SessionId::new("browser");
    let origin = test_host();

    let url = client
        .login_at("github", RequestContext::new(&sid, &origin), &AuthorizeOptions::generate_state())
        .await
        .unwrap();

    let state = url.state.expect("state issued");
    assert!(url.url.ends_with(&format!("&state={}", state)));
}

#[tokio::test]
async fn test_disabled_provider_is_unknown() {
    let client = client_with(vec![fixture_provider(ProviderKind::Github).build()]);
    let sid = SessionId::new("browser");
    let origin = test_host();

    for name in ["facebook", "myspace"] {
        let err = client
            .login_at(name, RequestContext::new(&sid, &origin), &AuthorizeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "EXTAUTH_UNKNOWN_PROVIDER");
        assert!(matches!(err, ExternalAuthError::Configuration(_)));
    }
}
