//! Session behaviour after an external login: timeout, activity and
//! login/logout bookkeeping, activation notifications.

use std::sync::Arc;
use std::time::Duration;

use external_auth::{
    Access, CallbackParams, Clock, ExternalAuthConfigBuilder, MissingAccountPolicy,
    NotificationHook, ProviderKind, RequestContext, RequestOrigin, SessionId, SessionStore, User,
};
use mockall::mock;
use serde_json::Map;
use tokio_test::{assert_err, assert_ok};
use wiremock::MockServer;

use super::{harness, mount_oauth2_provider, oauth2_config, Harness};

mock! {
    pub Hook {}
    impl NotificationHook for Hook {
        fn on_activation_required(&self, user: &User);
        fn on_activation_succeeded(&self, user: &User);
    }
}

async fn logged_in(
    configure: impl FnOnce(ExternalAuthConfigBuilder) -> ExternalAuthConfigBuilder,
    kind: ProviderKind,
) -> (Harness, SessionId, MockServer) {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let h = harness(configure(oauth2_config(&server)).build().unwrap());
    h.accounts
        .insert_user(User::external("42", kind, "123", Map::new()));

    let sid = SessionId::new("browser");
    let origin = RequestOrigin::new("http", "test.host");
    let user = h
        .client
        .login_from_callback(
            kind.as_str(),
            RequestContext::new(&sid, &origin),
            &CallbackParams::with_code("code", None),
            MissingAccountPolicy::Reject,
        )
        .await
        .unwrap();
    assert_eq!(user.id, "42");

    (h, sid, server)
}

#[tokio::test]
async fn test_session_times_out_for_each_provider() {
    for kind in super::OAUTH2_PROVIDERS {
        let (h, sid, _server) = logged_in(
            |c| {
                c.session_timeout(Duration::from_millis(500))
                    .register_last_activity_time(false)
            },
            kind,
        )
        .await;
        let reconciler = h.client.reconciler();

        assert!(assert_ok!(reconciler.authenticate(&sid).await).is_some());

        h.clock.advance(Duration::from_millis(600));
        let access = assert_ok!(reconciler.require_login(&sid, Some("/protected")).await);

        match access {
            Access::Redirect(redirect) => {
                assert_eq!(redirect.location, "/login");
                assert!(redirect.alert().is_some());
            }
            Access::Granted(_) => panic!("session for {} should have timed out", kind),
        }
        assert_eq!(
            h.sessions.take_return_to(&sid).await.unwrap().as_deref(),
            Some("/protected")
        );
        assert!(h.sessions.session(&sid).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_activity_keeps_session_alive() {
    let (h, sid, _server) = logged_in(
        |c| c.session_timeout(Duration::from_millis(500)),
        ProviderKind::Github,
    )
    .await;
    let reconciler = h.client.reconciler();

    for _ in 0..3 {
        h.clock.advance(Duration::from_millis(300));
        assert!(reconciler.authenticate(&sid).await.unwrap().is_some());
    }
    assert_eq!(h.accounts.user("42").unwrap().last_activity_at, Some(h.clock.now()));

    h.clock.advance(Duration::from_millis(600));
    assert!(reconciler.authenticate(&sid).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_time_registered() {
    let (h, _sid, _server) = logged_in(|c| c, ProviderKind::Facebook).await;

    let user = h.accounts.user("42").unwrap();
    assert_eq!(user.last_login_at, Some(h.clock.now()));
}

#[tokio::test]
async fn test_login_time_not_registered_when_disabled() {
    let (h, _sid, _server) =
        logged_in(|c| c.register_login_time(false), ProviderKind::Facebook).await;

    assert_eq!(h.accounts.user("42").unwrap().last_login_at, None);
}

#[tokio::test]
async fn test_logout_time_registered() {
    let (h, sid, _server) = logged_in(|c| c, ProviderKind::Vk).await;
    h.clock.advance(Duration::from_secs(60));

    let ended = assert_ok!(h.client.reconciler().logout(&sid).await);
    assert!(ended.is_some());

    let user = h.accounts.user("42").unwrap();
    assert_eq!(user.last_logout_at, Some(h.clock.now()));
    assert!(h.client.reconciler().authenticate(&sid).await.unwrap().is_none());
}

#[tokio::test]
async fn test_no_activation_mail_for_external_users() {
    let server = MockServer::start().await;
    mount_oauth2_provider(&server).await;
    let Harness {
        client, accounts, ..
    } = harness(oauth2_config(&server).user_activation(true).build().unwrap());

    let mut hook = MockHook::new();
    hook.expect_on_activation_required().never();
    hook.expect_on_activation_succeeded().never();
    let client = client.with_notifier(Arc::new(hook));

    let sid = SessionId::new("browser");
    let origin = RequestOrigin::new("http", "test.host");
    let mut user = client
        .login_from_callback(
            "facebook",
            RequestContext::new(&sid, &origin),
            &CallbackParams::with_code("code", None),
            MissingAccountPolicy::Create,
        )
        .await
        .unwrap();
    assert_ok!(client.reconciler().activate(&mut user).await);

    assert!(user.is_active());
    assert!(accounts.user(&user.id).unwrap().is_active());
}

#[tokio::test]
async fn test_activation_mail_for_local_users() {
    let server = MockServer::start().await;
    let Harness {
        client, accounts, ..
    } = harness(oauth2_config(&server).user_activation(true).build().unwrap());

    let mut hook = MockHook::new();
    hook.expect_on_activation_required()
        .withf(|user| user.id == "local-1")
        .times(1)
        .return_const(());
    hook.expect_on_activation_succeeded()
        .times(1)
        .return_const(());
    let client = client.with_notifier(Arc::new(hook));

    let mut user = User::local("local-1");
    accounts.insert_user(user.clone());
    client.reconciler().after_registration(&user);
    assert_ok!(client.reconciler().activate(&mut user).await);
}

#[tokio::test]
async fn test_activating_unknown_user_fails() {
    let server = MockServer::start().await;
    let h = harness(oauth2_config(&server).build().unwrap());

    let mut ghost = User::local("ghost");
    assert_err!(h.client.reconciler().activate(&mut ghost).await);
    assert!(!ghost.is_active());
}
