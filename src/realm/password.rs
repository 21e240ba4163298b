//! Username/password realm backed by the external account store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::credential::{CredentialKind, Credentials};
use crate::error::Error;
use crate::permission::WildcardPermission;
use crate::store::{UserRecord, UserStore};

use super::{AuthenticationInfo, AuthorizationInfo, Principal, Realm};

pub const PASSWORD_REALM_NAME: &str = "password";

/// The canonical realm: authenticates username/password submissions and is
/// the single source of truth for roles and permissions. Other realms
/// delegate their authorization here so every login method sees the same
/// grants.
pub struct PasswordRealm<S> {
    name: String,
    store: Arc<S>,
}

impl<S> PasswordRealm<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            name: PASSWORD_REALM_NAME.to_string(),
            store,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Account-state gate shared by both realms: missing account, locked
/// account, and corrupt credential rows each map to their own error.
pub(super) fn validate_account(record: Option<UserRecord>) -> Result<UserRecord, Error> {
    let record = record.ok_or(Error::UnknownIdentity)?;
    if record.locked {
        return Err(Error::AccountLocked);
    }
    if record.password_hash.is_none() || record.salt.is_none() {
        return Err(Error::IncompleteCredentialRecord);
    }
    Ok(record)
}

impl<S: UserStore> PasswordRealm<S> {
    async fn load_authorization(&self, username: &str) -> Result<AuthorizationInfo, Error> {
        let roles = self.store.roles_by_username(username).await?;
        debug!(username, ?roles, "loaded roles");

        let direct = self.store.permissions_by_username(username).await?;
        let inherited = self.store.role_permissions_by_username(username).await?;
        debug!(
            username,
            direct = direct.len(),
            inherited = inherited.len(),
            "loaded permissions"
        );

        let mut permissions: HashSet<WildcardPermission> = HashSet::new();
        for raw in direct.iter().chain(inherited.iter()) {
            permissions.insert(WildcardPermission::parse(raw)?);
        }
        Ok(AuthorizationInfo::new(roles, permissions))
    }
}

#[async_trait]
impl<S: UserStore> Realm for PasswordRealm<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credentials: &Credentials) -> bool {
        credentials.kind() == CredentialKind::Password
    }

    async fn authentication_info(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticationInfo, Error> {
        let username = credentials.identifier();
        debug!(username, realm = %self.name, "authenticating");

        let record = validate_account(self.store.find_by_username(username).await?)?;
        let hash = record.password_hash.clone().unwrap_or_default();
        let salt = record.salt.clone().unwrap_or_default();
        let principal = Principal::new(record.id, record.username);
        Ok(AuthenticationInfo::hashed(principal, hash, salt, &self.name))
    }

    async fn authorization_info(&self, principal: &Principal) -> Result<AuthorizationInfo, Error> {
        self.load_authorization(principal.username()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, MetadataStore};

    async fn store_with_alice() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .add_user(UserRecord::new("alice").with_password("stored-hash", "stored-salt"))
            .await;
        store
    }

    #[tokio::test]
    async fn unknown_username_fails() {
        let realm = PasswordRealm::new(store_with_alice().await);
        let result = realm
            .authentication_info(&Credentials::password("bob", "x"))
            .await;
        assert!(matches!(result, Err(Error::UnknownIdentity)));
    }

    #[tokio::test]
    async fn locked_account_fails() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_user(
                UserRecord::new("carol")
                    .with_password("hash", "salt")
                    .locked(),
            )
            .await;
        let realm = PasswordRealm::new(store);
        let result = realm
            .authentication_info(&Credentials::password("carol", "x"))
            .await;
        assert!(matches!(result, Err(Error::AccountLocked)));
    }

    #[tokio::test]
    async fn missing_hash_or_salt_is_a_data_fault() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(UserRecord::new("dave")).await;
        let realm = PasswordRealm::new(store);
        let result = realm
            .authentication_info(&Credentials::password("dave", "x"))
            .await;
        assert!(matches!(result, Err(Error::IncompleteCredentialRecord)));
    }

    #[tokio::test]
    async fn returns_stored_material_without_comparing() {
        let realm = PasswordRealm::new(store_with_alice().await);
        // Wrong password still yields info; the comparison is not this layer's job.
        let info = realm
            .authentication_info(&Credentials::password("alice", "wrong"))
            .await
            .unwrap();
        assert_eq!(info.principal().username(), "alice");
        assert_eq!(info.realm(), PASSWORD_REALM_NAME);
        match info.credential() {
            super::super::StoredCredential::Hashed { hash, salt } => {
                assert_eq!(hash, "stored-hash");
                assert_eq!(salt, "stored-salt");
            }
            other => panic!("expected hashed credential, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn authorization_unions_direct_and_inherited() {
        let store = store_with_alice().await;
        store.assign_role("alice", "admin").await;
        store.grant_permission("alice", "report:download").await;

        let role_id = store.insert_role("admin").await.unwrap();
        let perm_id = store
            .insert_permission("User Management", "user:*", None)
            .await
            .unwrap();
        store.link_role_permission(role_id, perm_id).await.unwrap();

        let realm = PasswordRealm::new(store);
        let principal = Principal::new(uuid::Uuid::new_v4(), "alice");
        let info = realm.authorization_info(&principal).await.unwrap();

        assert!(info.has_role("admin"));
        assert!(info.implies(&WildcardPermission::parse("user:delete").unwrap()));
        assert!(info.implies(&WildcardPermission::parse("report:download").unwrap()));
        assert!(!info.implies(&WildcardPermission::parse("billing:view").unwrap()));
    }

    #[tokio::test]
    async fn does_not_support_sms_submissions() {
        let realm = PasswordRealm::new(store_with_alice().await);
        assert!(realm.supports(&Credentials::password("alice", "x")));
        assert!(!realm.supports(&Credentials::sms_code("13800000000", "1234")));
    }
}
