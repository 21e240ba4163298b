//! Per-session authorization data, cached between checks.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::realm::{AuthorizationInfo, Principal, Realm};

/// Whether authorization data is fetched once per session or on every check.
/// A trade-off between staleness and store load; per-session is the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    #[default]
    PerSession,
    PerCheck,
}

/// Shared cache of granted roles/permissions keyed by principal id.
///
/// Entries are published only after the realm has built the complete
/// `AuthorizationInfo`; readers clone the `Arc` and can never observe a
/// half-populated set. Writes happen on login, logout, and explicit
/// invalidation only.
pub struct AuthorizationCache {
    policy: CachePolicy,
    entries: RwLock<HashMap<Uuid, Arc<AuthorizationInfo>>>,
}

impl AuthorizationCache {
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Authorization data for the principal: the cached entry when the
    /// policy allows, otherwise freshly loaded from the realm (and published
    /// under `PerSession`).
    ///
    /// # Errors
    ///
    /// Propagates the realm's load failure.
    pub async fn authorization_for(
        &self,
        principal: &Principal,
        realm: &dyn Realm,
    ) -> Result<Arc<AuthorizationInfo>, Error> {
        if self.policy == CachePolicy::PerSession {
            let entries = self.entries.read().await;
            if let Some(info) = entries.get(&principal.id()) {
                return Ok(Arc::clone(info));
            }
        }

        let info = Arc::new(realm.authorization_info(principal).await?);
        if self.policy == CachePolicy::PerSession {
            let mut entries = self.entries.write().await;
            entries.insert(principal.id(), Arc::clone(&info));
            debug!(username = %principal.username(), "published authorization data");
        }
        Ok(info)
    }

    /// Drop the principal's cached entry, on logout or grant change.
    pub async fn invalidate(&self, principal: &Principal) {
        let mut entries = self.entries.write().await;
        entries.remove(&principal.id());
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::{PasswordRealm, Realm};
    use crate::store::{MemoryStore, UserRecord};

    async fn fixtures() -> (Arc<MemoryStore>, PasswordRealm<MemoryStore>, Principal) {
        let store = Arc::new(MemoryStore::new());
        let record = UserRecord::new("alice").with_password("hash", "salt");
        let principal = Principal::new(record.id, "alice");
        store.add_user(record).await;
        store.assign_role("alice", "editor").await;
        let realm = PasswordRealm::new(Arc::clone(&store));
        (store, realm, principal)
    }

    #[tokio::test]
    async fn per_session_serves_the_published_entry() {
        let (store, realm, principal) = fixtures().await;
        let cache = AuthorizationCache::new(CachePolicy::PerSession);

        let first = cache.authorization_for(&principal, &realm).await.unwrap();
        assert!(first.has_role("editor"));

        // A grant added behind the cache is not seen until invalidation.
        store.assign_role("alice", "admin").await;
        let second = cache.authorization_for(&principal, &realm).await.unwrap();
        assert!(!second.has_role("admin"));
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate(&principal).await;
        let third = cache.authorization_for(&principal, &realm).await.unwrap();
        assert!(third.has_role("admin"));
    }

    #[tokio::test]
    async fn per_check_refetches_every_time() {
        let (store, realm, principal) = fixtures().await;
        let cache = AuthorizationCache::new(CachePolicy::PerCheck);

        let first = cache.authorization_for(&principal, &realm).await.unwrap();
        assert!(!first.has_role("admin"));

        store.assign_role("alice", "admin").await;
        let second = cache.authorization_for(&principal, &realm).await.unwrap();
        assert!(second.has_role("admin"));
    }

    #[tokio::test]
    async fn clear_drops_all_entries() {
        let (store, realm, principal) = fixtures().await;
        let cache = AuthorizationCache::new(CachePolicy::PerSession);
        cache.authorization_for(&principal, &realm).await.unwrap();

        store.assign_role("alice", "admin").await;
        cache.clear().await;
        let reloaded = cache.authorization_for(&principal, &realm).await.unwrap();
        assert!(reloaded.has_role("admin"));
    }
}
