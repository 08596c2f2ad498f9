//! Account Store
//!
//! The user-account collaborator: lookup and creation by external identity.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{AccountError, ExternalAuthError};
use crate::mapping::MappedAttributes;
use crate::types::{ActivationState, ActivityRecord, AuthenticationRecord, ProviderKind, User};

/// Hook run on a freshly built user before it is committed. Returning an
/// error aborts the creation.
pub type CompletionCallback<'a> = &'a (dyn Fn(&User) -> Result<(), AccountError> + Send + Sync);

/// Account store interface.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find the user linked to `(provider, uid)`.
    async fn find_authentication(
        &self,
        provider: ProviderKind,
        uid: &str,
    ) -> Result<Option<User>, ExternalAuthError>;

    /// Create a user together with its authentication record.
    async fn create_user(
        &self,
        provider: ProviderKind,
        uid: &str,
        attributes: MappedAttributes,
        on_created: Option<CompletionCallback<'_>>,
    ) -> Result<User, ExternalAuthError>;

    /// Persist a login/logout/activity fact.
    async fn record_activity(
        &self,
        user_id: &str,
        activity: ActivityRecord,
    ) -> Result<(), ExternalAuthError>;

    /// Mark the user active.
    async fn activate(&self, user_id: &str) -> Result<(), ExternalAuthError>;

    /// Remove all users and authentication records (test support).
    async fn delete_all(&self) -> Result<(), ExternalAuthError>;
}

#[derive(Default)]
struct Accounts {
    users: HashMap<String, User>,
    authentications: HashMap<(ProviderKind, String), AuthenticationRecord>,
    next_id: u64,
}

/// In-memory account store implementation.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<Accounts>,
    create_history: Mutex<Vec<(ProviderKind, String, MappedAttributes)>>,
    lookup_history: Mutex<Vec<(ProviderKind, String)>>,
}

impl InMemoryAccountStore {
    /// Create new in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already existing user (local or external).
    pub fn insert_user(&self, user: User) {
        let mut accounts = self.accounts.lock().unwrap();
        if let crate::types::UserOrigin::External {
            provider,
            external_uid,
        } = &user.origin
        {
            accounts.authentications.insert(
                (*provider, external_uid.clone()),
                AuthenticationRecord {
                    user_id: user.id.clone(),
                    provider: *provider,
                    external_uid: external_uid.clone(),
                },
            );
        }
        accounts.users.insert(user.id.clone(), user);
    }

    /// Get a user by id.
    pub fn user(&self, user_id: &str) -> Option<User> {
        self.accounts.lock().unwrap().users.get(user_id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.accounts.lock().unwrap().users.len()
    }

    pub fn authentication_records(&self) -> Vec<AuthenticationRecord> {
        self.accounts
            .lock()
            .unwrap()
            .authentications
            .values()
            .cloned()
            .collect()
    }

    /// Arguments of every `create_user` call, in order.
    pub fn get_create_history(&self) -> Vec<(ProviderKind, String, MappedAttributes)> {
        self.create_history.lock().unwrap().clone()
    }

    /// Arguments of every `find_authentication` call, in order.
    pub fn get_lookup_history(&self) -> Vec<(ProviderKind, String)> {
        self.lookup_history.lock().unwrap().clone()
    }

    fn duplicate(provider: ProviderKind, uid: &str) -> ExternalAuthError {
        AccountError::DuplicateAuthentication {
            provider: provider.to_string(),
            uid: uid.to_string(),
        }
        .into()
    }

    fn with_user(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut User),
    ) -> Result<(), ExternalAuthError> {
        let mut accounts = self.accounts.lock().unwrap();
        let user = accounts
            .users
            .get_mut(user_id)
            .ok_or_else(|| AccountError::Storage {
                message: format!("user {} does not exist", user_id),
            })?;
        f(user);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_authentication(
        &self,
        provider: ProviderKind,
        uid: &str,
    ) -> Result<Option<User>, ExternalAuthError> {
        self.lookup_history
            .lock()
            .unwrap()
            .push((provider, uid.to_string()));

        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .authentications
            .get(&(provider, uid.to_string()))
            .and_then(|record| accounts.users.get(&record.user_id))
            .cloned())
    }

    async fn create_user(
        &self,
        provider: ProviderKind,
        uid: &str,
        attributes: MappedAttributes,
        on_created: Option<CompletionCallback<'_>>,
    ) -> Result<User, ExternalAuthError> {
        self.create_history
            .lock()
            .unwrap()
            .push((provider, uid.to_string(), attributes.clone()));

        let key = (provider, uid.to_string());
        let id = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.authentications.contains_key(&key) {
                return Err(Self::duplicate(provider, uid));
            }
            accounts.next_id += 1;
            accounts.next_id.to_string()
        };

        let user = User::external(id, provider, uid, attributes);

        if let Some(callback) = on_created {
            callback(&user)?;
        }

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.authentications.contains_key(&key) {
            return Err(Self::duplicate(provider, uid));
        }
        accounts.authentications.insert(
            key,
            AuthenticationRecord {
                user_id: user.id.clone(),
                provider,
                external_uid: uid.to_string(),
            },
        );
        accounts.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn record_activity(
        &self,
        user_id: &str,
        activity: ActivityRecord,
    ) -> Result<(), ExternalAuthError> {
        self.with_user(user_id, |user| match activity {
            ActivityRecord::Login(at) => user.last_login_at = Some(at),
            ActivityRecord::Logout(at) => user.last_logout_at = Some(at),
            ActivityRecord::LastActivity(at) => user.last_activity_at = Some(at),
            ActivityRecord::LoginIp(ip) => user.last_login_from_ip_address = Some(ip),
        })
    }

    async fn activate(&self, user_id: &str) -> Result<(), ExternalAuthError> {
        self.with_user(user_id, |user| user.activation_state = ActivationState::Active)
    }

    async fn delete_all(&self) -> Result<(), ExternalAuthError> {
        let mut accounts = self.accounts.lock().unwrap();
        accounts.users.clear();
        accounts.authentications.clear();
        Ok(())
    }
}
