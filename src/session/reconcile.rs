//! Session Reconciliation
//!
//! Turns an external identity into a local login: finds or creates the
//! account, starts the session, and enforces the timeout and activity
//! policies on later requests.

use std::sync::Arc;

use crate::core::{Clock, SystemClock};
use crate::error::ExternalAuthError;
use crate::mapping::MappedAttributes;
use crate::session::{
    AccountStore, CompletionCallback, NoOpNotificationHook, NotificationHook, SessionStore,
};
use crate::types::{
    ActivationState, ActivityRecord, Flash, ProviderKind, Redirect, Session, SessionId,
    SessionPolicy, User,
};

/// Result of an access check on a protected request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Granted(Session),
    /// Not logged in (or timed out); send the browser here.
    Redirect(Redirect),
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// Session reconciliation engine.
pub struct SessionReconciler<A: AccountStore, S: SessionStore> {
    policy: SessionPolicy,
    login_path: String,
    accounts: Arc<A>,
    sessions: Arc<S>,
    notifier: Arc<dyn NotificationHook>,
    clock: Arc<dyn Clock>,
}

impl<A: AccountStore, S: SessionStore> SessionReconciler<A, S> {
    /// Create an engine with the system clock and no notifications.
    pub fn new(policy: SessionPolicy, accounts: Arc<A>, sessions: Arc<S>) -> Self {
        Self {
            policy,
            login_path: "/login".to_string(),
            accounts,
            sessions,
            notifier: Arc::new(NoOpNotificationHook),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationHook>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Where unauthenticated requests are redirected.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn accounts(&self) -> &Arc<A> {
        &self.accounts
    }

    pub fn sessions(&self) -> &Arc<S> {
        &self.sessions
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Create a local account for an external identity.
    ///
    /// `on_created` sees the new user before it is committed; an error from
    /// it leaves nothing behind.
    #[tracing::instrument(skip(self, attributes, on_created), fields(provider = %provider))]
    pub async fn create_from(
        &self,
        provider: ProviderKind,
        uid: &str,
        attributes: MappedAttributes,
        on_created: Option<CompletionCallback<'_>>,
    ) -> Result<User, ExternalAuthError> {
        let user = self
            .accounts
            .create_user(provider, uid, attributes, on_created)
            .await?;
        tracing::info!(user_id = %user.id, "created user from external identity");
        self.after_registration(&user);
        Ok(user)
    }

    /// Post-registration hook. External users are pre-verified by their
    /// provider and never get an activation request.
    pub fn after_registration(&self, user: &User) {
        if self.policy.user_activation && !user.is_external() {
            self.notifier.on_activation_required(user);
        }
    }

    /// Activate a user. External users get no success notification.
    pub async fn activate(&self, user: &mut User) -> Result<(), ExternalAuthError> {
        self.accounts.activate(&user.id).await?;
        user.activation_state = ActivationState::Active;
        if self.policy.user_activation && !user.is_external() {
            self.notifier.on_activation_succeeded(user);
        }
        Ok(())
    }

    /// Log in the user linked to `(provider, uid)`.
    ///
    /// Returns `None` when no account is linked; no session is started then.
    #[tracing::instrument(skip(self, ip_address), fields(provider = %provider))]
    pub async fn login_from(
        &self,
        provider: ProviderKind,
        uid: &str,
        session_id: &SessionId,
        ip_address: Option<&str>,
    ) -> Result<Option<User>, ExternalAuthError> {
        let Some(user) = self.accounts.find_authentication(provider, uid).await? else {
            tracing::info!("no account linked to external identity");
            return Ok(None);
        };

        self.auto_login(&user, session_id, ip_address).await?;
        Ok(Some(user))
    }

    /// Start a session for `user` and record the login.
    pub async fn auto_login(
        &self,
        user: &User,
        session_id: &SessionId,
        ip_address: Option<&str>,
    ) -> Result<Session, ExternalAuthError> {
        let now = self.clock.now();
        let session = Session::new(&user.id, now).with_ip_address(ip_address.map(str::to_string));
        self.sessions.start_session(session_id, session.clone()).await?;

        if self.policy.register_login_time {
            self.accounts
                .record_activity(&user.id, ActivityRecord::Login(now))
                .await?;
        }
        if self.policy.register_last_ip_address {
            if let Some(ip) = ip_address {
                self.accounts
                    .record_activity(&user.id, ActivityRecord::LoginIp(ip.to_string()))
                    .await?;
            }
        }

        tracing::info!(user_id = %user.id, "session started");
        Ok(session)
    }

    /// Current session, after applying the timeout and activity policies.
    pub async fn authenticate(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, ExternalAuthError> {
        let Some(mut session) = self.sessions.session(session_id).await? else {
            return Ok(None);
        };
        let now = self.clock.now();

        if let Some(timeout) = self.policy.session_timeout {
            if session.is_timed_out(timeout, now) {
                self.sessions.end_session(session_id).await?;
                tracing::info!(user_id = %session.user_id, "session timed out");
                return Ok(None);
            }
        }

        if self.policy.register_last_activity_time {
            self.sessions.touch(session_id, now).await?;
            self.accounts
                .record_activity(&session.user_id, ActivityRecord::LastActivity(now))
                .await?;
            session.last_activity_at = now;
        }

        Ok(Some(session))
    }

    /// Gate a protected request. Unauthenticated requests remember
    /// `requested_url` for after login and are sent to the login path.
    pub async fn require_login(
        &self,
        session_id: &SessionId,
        requested_url: Option<&str>,
    ) -> Result<Access, ExternalAuthError> {
        if let Some(session) = self.authenticate(session_id).await? {
            return Ok(Access::Granted(session));
        }

        if let Some(url) = requested_url {
            self.sessions
                .set_return_to(session_id, url.to_string())
                .await?;
        }
        Ok(Access::Redirect(
            Redirect::to(&self.login_path)
                .with_flash(Flash::Alert("Please sign in first.".to_string())),
        ))
    }

    /// End the session.
    pub async fn logout(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, ExternalAuthError> {
        let ended = self.sessions.end_session(session_id).await?;
        if let Some(session) = &ended {
            if self.policy.register_logout_time {
                self.accounts
                    .record_activity(&session.user_id, ActivityRecord::Logout(self.clock.now()))
                    .await?;
            }
            tracing::info!(user_id = %session.user_id, "logged out");
        }
        Ok(ended)
    }
}
