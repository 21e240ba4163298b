//! External store boundary: accounts, grants, SMS codes, and seed metadata.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Account row as the engine sees it. The stored hash and salt may be absent
/// on a corrupt record; realms surface that as a data-integrity fault, not a
/// user error.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub salt: Option<String>,
    pub locked: bool,
}

impl UserRecord {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            phone_number: None,
            password_hash: None,
            salt: None,
            locked: false,
        }
    }

    #[must_use]
    pub fn with_password(mut self, hash: impl Into<String>, salt: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self.salt = Some(salt.into());
        self
    }

    #[must_use]
    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    #[must_use]
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// Lookup surface for accounts and their grants. Implementations own their
/// own timeouts; the engine adds none and cancels in-flight lookups when the
/// caller's future is dropped.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<UserRecord>>;
    /// Role names directly assigned to the account.
    async fn roles_by_username(&self, username: &str) -> Result<HashSet<String>>;
    /// Permission strings directly assigned to the account.
    async fn permissions_by_username(&self, username: &str) -> Result<HashSet<String>>;
    /// Permission strings inherited through the account's roles.
    async fn role_permissions_by_username(&self, username: &str) -> Result<HashSet<String>>;
}

/// Source of the one-time codes the SMS realm verifies against.
#[async_trait]
pub trait SmsCodeStore: Send + Sync {
    /// Current unexpired code issued to the phone number, if any.
    async fn current_code(&self, phone_number: &str) -> Result<Option<String>>;
}

/// Seeding surface for role/permission metadata. Parent links are patched in
/// a second pass because ids do not exist until the first pass has inserted
/// every permission.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn role_count(&self) -> Result<u64>;
    async fn permission_count(&self) -> Result<u64>;
    async fn insert_role(&self, name: &str) -> Result<Uuid>;
    async fn insert_permission(
        &self,
        name: &str,
        permission: &str,
        description: Option<&str>,
    ) -> Result<Uuid>;
    async fn set_permission_parent(&self, id: Uuid, parent: Uuid) -> Result<()>;
    async fn link_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()>;
}

#[derive(Clone, Debug)]
struct RoleRow {
    name: String,
}

#[derive(Clone, Debug)]
struct PermissionRow {
    name: String,
    permission: String,
    parent: Option<Uuid>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    phone_index: HashMap<String, String>,
    user_roles: HashMap<String, HashSet<String>>,
    user_permissions: HashMap<String, HashSet<String>>,
    roles: HashMap<Uuid, RoleRow>,
    permissions: HashMap<Uuid, PermissionRow>,
    role_permissions: HashMap<Uuid, HashSet<Uuid>>,
    sms_codes: HashMap<String, String>,
}

/// In-memory implementation of every store trait. Backs the test suite and
/// small embeddings that keep their account data in process.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, record: UserRecord) {
        let mut inner = self.inner.write().await;
        if let Some(phone) = &record.phone_number {
            inner.phone_index.insert(phone.clone(), record.username.clone());
        }
        inner.users.insert(record.username.clone(), record);
    }

    pub async fn assign_role(&self, username: &str, role: &str) {
        let mut inner = self.inner.write().await;
        inner
            .user_roles
            .entry(username.to_string())
            .or_default()
            .insert(role.to_string());
    }

    pub async fn grant_permission(&self, username: &str, permission: &str) {
        let mut inner = self.inner.write().await;
        inner
            .user_permissions
            .entry(username.to_string())
            .or_default()
            .insert(permission.to_string());
    }

    pub async fn set_sms_code(&self, phone_number: &str, code: &str) {
        let mut inner = self.inner.write().await;
        inner
            .sms_codes
            .insert(phone_number.to_string(), code.to_string());
    }

    pub async fn clear_sms_code(&self, phone_number: &str) {
        let mut inner = self.inner.write().await;
        inner.sms_codes.remove(phone_number);
    }

    /// Seeded role names, for embedder introspection.
    pub async fn role_names(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner.roles.values().map(|row| row.name.clone()).collect();
        names.sort();
        names
    }

    /// Permission strings reachable through a role.
    pub async fn permission_strings_for_role(&self, role: &str) -> HashSet<String> {
        let inner = self.inner.read().await;
        let Some(role_id) = inner
            .roles
            .iter()
            .find(|(_, row)| row.name == role)
            .map(|(id, _)| *id)
        else {
            return HashSet::new();
        };
        inner
            .role_permissions
            .get(&role_id)
            .into_iter()
            .flatten()
            .filter_map(|permission_id| inner.permissions.get(permission_id))
            .map(|row| row.permission.clone())
            .collect()
    }

    /// Name of a permission's parent, if a parent link was patched in.
    pub async fn permission_parent_name(&self, name: &str) -> Option<String> {
        let inner = self.inner.read().await;
        let row = inner.permissions.values().find(|row| row.name == name)?;
        let parent_id = row.parent?;
        inner
            .permissions
            .get(&parent_id)
            .map(|parent| parent.name.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(username).cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .phone_index
            .get(phone_number)
            .and_then(|username| inner.users.get(username))
            .cloned())
    }

    async fn roles_by_username(&self, username: &str) -> Result<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner.user_roles.get(username).cloned().unwrap_or_default())
    }

    async fn permissions_by_username(&self, username: &str) -> Result<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .user_permissions
            .get(username)
            .cloned()
            .unwrap_or_default())
    }

    async fn role_permissions_by_username(&self, username: &str) -> Result<HashSet<String>> {
        let inner = self.inner.read().await;
        let Some(role_names) = inner.user_roles.get(username) else {
            return Ok(HashSet::new());
        };
        let role_ids: Vec<Uuid> = inner
            .roles
            .iter()
            .filter(|(_, row)| role_names.contains(&row.name))
            .map(|(id, _)| *id)
            .collect();
        Ok(role_ids
            .iter()
            .filter_map(|role_id| inner.role_permissions.get(role_id))
            .flatten()
            .filter_map(|permission_id| inner.permissions.get(permission_id))
            .map(|row| row.permission.clone())
            .collect())
    }
}

#[async_trait]
impl SmsCodeStore for MemoryStore {
    async fn current_code(&self, phone_number: &str) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner.sms_codes.get(phone_number).cloned())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn role_count(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.roles.len() as u64)
    }

    async fn permission_count(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.permissions.len() as u64)
    }

    async fn insert_role(&self, name: &str) -> Result<Uuid> {
        let mut inner = self.inner.write().await;
        if inner.roles.values().any(|row| row.name == name) {
            return Err(anyhow!("role {name:?} already exists"));
        }
        let id = Uuid::new_v4();
        inner.roles.insert(
            id,
            RoleRow {
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn insert_permission(
        &self,
        name: &str,
        permission: &str,
        _description: Option<&str>,
    ) -> Result<Uuid> {
        let mut inner = self.inner.write().await;
        if inner.permissions.values().any(|row| row.name == name) {
            return Err(anyhow!("permission {name:?} already exists"));
        }
        let id = Uuid::new_v4();
        inner.permissions.insert(
            id,
            PermissionRow {
                name: name.to_string(),
                permission: permission.to_string(),
                parent: None,
            },
        );
        Ok(id)
    }

    async fn set_permission_parent(&self, id: Uuid, parent: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.permissions.contains_key(&parent) {
            return Err(anyhow!("parent permission {parent} does not exist"));
        }
        let row = inner
            .permissions
            .get_mut(&id)
            .ok_or_else(|| anyhow!("permission {id} does not exist"))?;
        row.parent = Some(parent);
        Ok(())
    }

    async fn link_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.roles.contains_key(&role_id) {
            return Err(anyhow!("role {role_id} does not exist"));
        }
        if !inner.permissions.contains_key(&permission_id) {
            return Err(anyhow!("permission {permission_id} does not exist"));
        }
        inner
            .role_permissions
            .entry(role_id)
            .or_default()
            .insert(permission_id);
        Ok(())
    }
}
