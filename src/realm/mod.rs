//! Realms: pluggable sources of identity and permission data.

pub mod password;
pub mod sms;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credential::Credentials;
use crate::error::Error;
use crate::permission::{has_all_permissions, has_any_permission, WildcardPermission};

pub use password::PasswordRealm;
pub use sms::SmsCodeRealm;

/// Authenticated identity of a caller. Compared by id so the same account is
/// one principal no matter which realm produced it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Principal {
    id: Uuid,
    username: String,
}

impl Principal {
    #[must_use]
    pub fn new(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Principal {}

impl std::hash::Hash for Principal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Stored credential material a realm hands back for verification.
#[derive(Clone, Debug)]
pub enum StoredCredential {
    /// Salted, iterated hash to compare the submitted secret against.
    Hashed { hash: String, salt: String },
    /// The realm already verified the submitted secret itself (one-time
    /// codes have no stored hash to re-derive).
    PreVerified,
}

/// Outcome of a realm's account lookup: the principal plus the stored
/// credential material. The realm never compares secrets for the hashed
/// case; the authenticator does.
#[derive(Clone, Debug)]
pub struct AuthenticationInfo {
    principal: Principal,
    credential: StoredCredential,
    realm: String,
}

impl AuthenticationInfo {
    #[must_use]
    pub fn hashed(
        principal: Principal,
        hash: impl Into<String>,
        salt: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            principal,
            credential: StoredCredential::Hashed {
                hash: hash.into(),
                salt: salt.into(),
            },
            realm: realm.into(),
        }
    }

    #[must_use]
    pub fn pre_verified(principal: Principal, realm: impl Into<String>) -> Self {
        Self {
            principal,
            credential: StoredCredential::PreVerified,
            realm: realm.into(),
        }
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn credential(&self) -> &StoredCredential {
        &self.credential
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub(crate) fn into_principal(self) -> Principal {
        self.principal
    }
}

/// Roles and granted permissions for one principal. Built in full before it
/// is published to any cache; checks only ever see a complete set.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationInfo {
    roles: HashSet<String>,
    permissions: HashSet<WildcardPermission>,
}

impl AuthorizationInfo {
    #[must_use]
    pub fn new(roles: HashSet<String>, permissions: HashSet<WildcardPermission>) -> Self {
        Self { roles, permissions }
    }

    #[must_use]
    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    #[must_use]
    pub fn permissions(&self) -> &HashSet<WildcardPermission> {
        &self.permissions
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    #[must_use]
    pub fn has_all_roles<'a>(&self, roles: impl IntoIterator<Item = &'a str>) -> bool {
        roles.into_iter().all(|role| self.has_role(role))
    }

    #[must_use]
    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a str>) -> bool {
        roles.into_iter().any(|role| self.has_role(role))
    }

    #[must_use]
    pub fn implies(&self, requested: &WildcardPermission) -> bool {
        self.permissions.iter().any(|grant| grant.implies(requested))
    }

    #[must_use]
    pub fn implies_all(&self, requested: &[WildcardPermission]) -> bool {
        has_all_permissions(self.permissions.iter(), requested.iter())
    }

    #[must_use]
    pub fn implies_any(&self, requested: &[WildcardPermission]) -> bool {
        has_any_permission(self.permissions.iter(), requested.iter())
    }

    /// Guard-style role check for programmatic use outside the chain.
    ///
    /// # Errors
    ///
    /// Returns `Error::AccessDenied` when the role is missing.
    pub fn require_role(&self, role: &str) -> Result<(), Error> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }

    /// Guard-style permission check for programmatic use outside the chain.
    ///
    /// # Errors
    ///
    /// Returns `Error::AccessDenied` when no granted permission implies the
    /// requested one.
    pub fn require_permission(&self, requested: &WildcardPermission) -> Result<(), Error> {
        if self.implies(requested) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }
}

/// A pluggable source of authentication and authorization data for one
/// credential type. `supports` is the dispatch predicate: the authenticator
/// only routes a submission to realms that claim it.
#[async_trait]
pub trait Realm: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, credentials: &Credentials) -> bool;

    /// Look up the account for the submitted credentials and return the
    /// stored material. Fails with `UnknownIdentity`, `AccountLocked`, or
    /// `IncompleteCredentialRecord`; never with `CredentialMismatch` — the
    /// comparison belongs to the authenticator.
    async fn authentication_info(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticationInfo, Error>;

    /// Load the principal's roles, direct permissions, and role-inherited
    /// permissions, unioned into one granted set.
    async fn authorization_info(&self, principal: &Principal) -> Result<AuthorizationInfo, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(raw: &str) -> WildcardPermission {
        WildcardPermission::parse(raw).unwrap()
    }

    #[test]
    fn principals_compare_by_id() {
        let id = Uuid::new_v4();
        let a = Principal::new(id, "alice");
        let b = Principal::new(id, "alice-renamed");
        let c = Principal::new(Uuid::new_v4(), "alice");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn authorization_role_checks() {
        let info = AuthorizationInfo::new(
            ["editor".to_string(), "author".to_string()].into(),
            HashSet::new(),
        );
        assert!(info.has_role("editor"));
        assert!(info.has_all_roles(["editor", "author"]));
        assert!(!info.has_all_roles(["editor", "admin"]));
        assert!(info.has_any_role(["admin", "author"]));
        assert!(!info.has_any_role(["admin", "root"]));
    }

    #[test]
    fn guard_checks_return_access_denied() {
        let info = AuthorizationInfo::new(
            ["editor".to_string()].into(),
            [perm("user:view")].into(),
        );
        assert!(info.require_role("editor").is_ok());
        assert!(matches!(
            info.require_role("admin"),
            Err(Error::AccessDenied)
        ));
        assert!(info.require_permission(&perm("user:view")).is_ok());
        assert!(matches!(
            info.require_permission(&perm("user:delete")),
            Err(Error::AccessDenied)
        ));
    }

    #[test]
    fn authorization_permission_checks() {
        let info = AuthorizationInfo::new(
            HashSet::new(),
            [perm("user:*"), perm("report:view")].into(),
        );
        assert!(info.implies(&perm("user:delete")));
        assert!(!info.implies(&perm("report:download")));
        assert!(info.implies_all(&[perm("user:create"), perm("report:view")]));
        assert!(!info.implies_all(&[perm("user:create"), perm("report:download")]));
        assert!(info.implies_any(&[perm("billing:view"), perm("report:view")]));
    }
}
