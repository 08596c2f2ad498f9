//! External Authentication Client
//!
//! High-level client combining the registry, the provider flows and session
//! reconciliation into the redirect-out / callback-in login flow.

use std::sync::Arc;

use crate::core::{Clock, HttpTransport, ReqwestHttpTransport};
use crate::error::{AccountError, AuthorizationError, ExternalAuthError};
use crate::flows::exchange::ExchangeRequest;
use crate::flows::{self, resolve_callback_url, AuthorizationUrl, AuthorizeOptions};
use crate::mapping::{map_user_info, MappedAttributes};
use crate::registry::ProviderRegistry;
use crate::session::{
    AccountStore, CompletionCallback, InMemoryAccountStore, InMemorySessionStore, NotificationHook,
    SessionReconciler, SessionStore,
};
use crate::types::{
    AccessToken, CallbackParams, ExternalAuthConfig, ExternalIdentity, Flash, ProviderConfig,
    Redirect, RequestOrigin, SessionId, User,
};

/// What to do when a callback identity has no local account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingAccountPolicy {
    /// Fail the login.
    #[default]
    Reject,
    /// Create the account from the mapped attributes, then log in.
    Create,
}

/// The browser request being served.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext<'a> {
    pub session_id: &'a SessionId,
    /// Scheme and host, for relative callback URLs.
    pub origin: &'a RequestOrigin,
    pub ip_address: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn new(session_id: &'a SessionId, origin: &'a RequestOrigin) -> Self {
        Self {
            session_id,
            origin,
            ip_address: None,
        }
    }

    pub fn with_ip_address(mut self, ip: &'a str) -> Self {
        self.ip_address = Some(ip);
        self
    }
}

/// External authentication client.
pub struct ExternalAuthClient<
    T: HttpTransport = ReqwestHttpTransport,
    A: AccountStore = InMemoryAccountStore,
    S: SessionStore = InMemorySessionStore,
> {
    config: Arc<ExternalAuthConfig>,
    registry: ProviderRegistry,
    transport: Arc<T>,
    reconciler: SessionReconciler<A, S>,
}

impl ExternalAuthClient<ReqwestHttpTransport, InMemoryAccountStore, InMemorySessionStore> {
    /// Create a client with the reqwest transport and in-memory stores.
    pub fn new(config: ExternalAuthConfig) -> Result<Self, ExternalAuthError> {
        Self::with_components(
            config,
            ReqwestHttpTransport::new()?,
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemorySessionStore::new()),
        )
    }
}

impl<T: HttpTransport, A: AccountStore, S: SessionStore> ExternalAuthClient<T, A, S> {
    /// Create a client with custom implementations.
    pub fn with_components(
        config: ExternalAuthConfig,
        transport: T,
        accounts: Arc<A>,
        sessions: Arc<S>,
    ) -> Result<Self, ExternalAuthError> {
        let registry = ProviderRegistry::from_config(&config)?;
        let reconciler = SessionReconciler::new(config.session.clone(), accounts, sessions)
            .with_login_path(config.redirects.login_path.clone());

        Ok(Self {
            config: Arc::new(config),
            registry,
            transport: Arc::new(transport),
            reconciler,
        })
    }

    /// Replace the activation notification hook.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationHook>) -> Self {
        self.reconciler = self.reconciler.with_notifier(notifier);
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reconciler = self.reconciler.with_clock(clock);
        self
    }

    pub fn config(&self) -> &ExternalAuthConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Session engine, for `authenticate`, `require_login` and `logout`.
    pub fn reconciler(&self) -> &SessionReconciler<A, S> {
        &self.reconciler
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Enabled provider by name.
    pub fn provider(&self, name: &str) -> Result<&ProviderConfig, ExternalAuthError> {
        Ok(self.registry.config_for(name)?)
    }

    // ========== Redirect Out ==========

    /// Build the URL to send the browser to for `provider`.
    pub async fn login_at(
        &self,
        provider: &str,
        request: RequestContext<'_>,
        options: &AuthorizeOptions,
    ) -> Result<AuthorizationUrl, ExternalAuthError> {
        let provider = self.provider(provider)?;
        flows::build_redirect(
            provider,
            request.origin,
            self.reconciler.sessions().as_ref(),
            request.session_id,
            options,
            self.reconciler.clock().now(),
        )
        .await
    }

    // ========== Callback In ==========

    /// Verify state and redeem the authorization code.
    pub async fn exchange(
        &self,
        provider: &str,
        request: RequestContext<'_>,
        code: &str,
        received_state: Option<&str>,
    ) -> Result<AccessToken, ExternalAuthError> {
        let provider = self.provider(provider)?;
        let redirect_uri = resolve_callback_url(provider, request.origin);
        flows::exchange(
            provider,
            self.transport.as_ref(),
            self.reconciler.sessions().as_ref(),
            ExchangeRequest {
                session_id: request.session_id,
                code,
                received_state,
                redirect_uri: &redirect_uri,
            },
            self.config.state_max_age,
            self.reconciler.clock().now(),
        )
        .await
    }

    /// Resolve the external identity behind `token`.
    pub async fn fetch_identity(
        &self,
        provider: &str,
        token: &AccessToken,
    ) -> Result<ExternalIdentity, ExternalAuthError> {
        let provider = self.provider(provider)?;
        flows::fetch_identity(provider, self.transport.as_ref(), token).await
    }

    /// Project an identity through the provider's user-info mapping.
    pub fn map_attributes(
        &self,
        provider: &str,
        identity: &ExternalIdentity,
    ) -> Result<MappedAttributes, ExternalAuthError> {
        let provider = self.provider(provider)?;
        Ok(map_user_info(
            &provider.user_info_mapping,
            &serde_json::Value::Object(identity.raw_attributes.clone()),
        ))
    }

    /// Create a local account for `identity` with the mapped attributes.
    pub async fn create_from(
        &self,
        identity: &ExternalIdentity,
        on_created: Option<CompletionCallback<'_>>,
    ) -> Result<User, ExternalAuthError> {
        let attributes = self.map_attributes(identity.provider.as_str(), identity)?;
        self.reconciler
            .create_from(identity.provider, &identity.external_uid, attributes, on_created)
            .await
    }

    /// Run the whole callback: state check, code exchange, identity fetch,
    /// then login (creating the account under [`MissingAccountPolicy::Create`]).
    pub async fn login_from_callback(
        &self,
        provider: &str,
        request: RequestContext<'_>,
        callback: &CallbackParams,
        policy: MissingAccountPolicy,
    ) -> Result<User, ExternalAuthError> {
        let config = self.provider(provider)?;

        // The first callback spends the pending state whatever it carries.
        let state_check = flows::check_state(
            self.reconciler.sessions().as_ref(),
            request.session_id,
            callback.state.as_deref(),
            self.config.state_max_age,
            self.reconciler.clock().now(),
        )
        .await;

        if let Some(error) = &callback.error {
            return Err(AuthorizationError::AccessDenied {
                error: error.clone(),
                error_description: callback.error_description.clone(),
            }
            .into());
        }
        state_check?;
        let code = callback
            .code
            .as_deref()
            .ok_or(AuthorizationError::MissingCode)?;

        let redirect_uri = resolve_callback_url(config, request.origin);
        let token = flows::redeem_code(config, self.transport.as_ref(), code, &redirect_uri).await?;
        let identity = self.fetch_identity(provider, &token).await?;

        if let Some(user) = self
            .reconciler
            .login_from(
                identity.provider,
                &identity.external_uid,
                request.session_id,
                request.ip_address,
            )
            .await?
        {
            return Ok(user);
        }

        match policy {
            MissingAccountPolicy::Reject => Err(AccountError::NotFound {
                provider: identity.provider.to_string(),
                uid: identity.external_uid,
            }
            .into()),
            MissingAccountPolicy::Create => {
                let user = self.create_from(&identity, None).await?;
                self.reconciler
                    .auto_login(&user, request.session_id, request.ip_address)
                    .await?;
                Ok(user)
            }
        }
    }

    /// Handle the provider callback and decide where the browser goes next.
    ///
    /// Failures never reach the browser in detail: they are logged and
    /// answered with the configured alert, or the error's generic user
    /// message when none is configured.
    pub async fn handle_callback(
        &self,
        provider: &str,
        request: RequestContext<'_>,
        callback: &CallbackParams,
        policy: MissingAccountPolicy,
    ) -> Redirect {
        let redirects = &self.config.redirects;

        match self
            .login_from_callback(provider, request, callback, policy)
            .await
        {
            Ok(user) => {
                tracing::info!(provider, user_id = %user.id, "external login succeeded");
                let location = match self
                    .reconciler
                    .sessions()
                    .take_return_to(request.session_id)
                    .await
                {
                    Ok(Some(url)) => url,
                    Ok(None) => redirects.after_login_path.clone(),
                    Err(e) => {
                        tracing::warn!(error = %e, "could not read return-to url");
                        redirects.after_login_path.clone()
                    }
                };
                Redirect::to(location).with_flash(Flash::Notice(redirects.success_notice.clone()))
            }
            Err(e) => {
                tracing::warn!(
                    provider,
                    error_code = e.error_code(),
                    error = %e,
                    "external login failed"
                );
                let alert = redirects
                    .failure_alert
                    .clone()
                    .unwrap_or_else(|| e.user_message());
                Redirect::to(&redirects.after_failure_path).with_flash(Flash::Alert(alert))
            }
        }
    }
}
