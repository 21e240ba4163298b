//! Seeding of role/permission metadata from configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::store::MetadataStore;

/// Declared permission row. `parent` names another seed entry — by name, not
/// id, because ids do not exist until the rows are inserted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PermissionSeed {
    pub name: String,
    pub permission: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Declared role with the names of the permissions it bundles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleSeed {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Bootstrap seed data for an empty store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub permissions: Vec<PermissionSeed>,
    #[serde(default)]
    pub roles: Vec<RoleSeed>,
}

/// What a seeding pass actually did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub permissions_inserted: usize,
    pub roles_inserted: usize,
    pub links_created: usize,
}

/// Seed roles and permissions into an empty store.
///
/// Deliberately two-phase: insert every permission first, then resolve
/// parent links by name and patch them, so no insert ever references an id
/// that does not exist yet. A populated store is left untouched — seeding is
/// idempotent across restarts.
///
/// # Errors
///
/// Propagates store failures; unresolvable parent or permission names are
/// logged and skipped, never turned into dangling links.
pub async fn seed(store: &dyn MetadataStore, data: &SeedData) -> Result<SeedOutcome, Error> {
    let mut outcome = SeedOutcome::default();

    let permission_ids = if store.permission_count().await? == 0 {
        let ids = insert_permissions(store, data, &mut outcome).await?;
        patch_parent_links(store, data, &ids).await?;
        ids
    } else {
        info!("permissions already present; skipping seed");
        HashMap::new()
    };

    if store.role_count().await? == 0 {
        insert_roles(store, data, &permission_ids, &mut outcome).await?;
    } else {
        info!("roles already present; skipping seed");
    }

    Ok(outcome)
}

/// First pass: insert every permission without its parent link, collecting
/// name → id for the second pass.
async fn insert_permissions(
    store: &dyn MetadataStore,
    data: &SeedData,
    outcome: &mut SeedOutcome,
) -> Result<HashMap<String, Uuid>, Error> {
    let mut ids = HashMap::with_capacity(data.permissions.len());
    for seed in &data.permissions {
        let id = store
            .insert_permission(&seed.name, &seed.permission, seed.description.as_deref())
            .await?;
        ids.insert(seed.name.clone(), id);
        outcome.permissions_inserted += 1;
    }
    if outcome.permissions_inserted > 0 {
        info!(count = outcome.permissions_inserted, "seeded permissions");
    }
    Ok(ids)
}

/// Second pass: resolve declared parent names against the freshly inserted
/// rows and patch the links.
async fn patch_parent_links(
    store: &dyn MetadataStore,
    data: &SeedData,
    ids: &HashMap<String, Uuid>,
) -> Result<(), Error> {
    for seed in &data.permissions {
        let Some(parent_name) = &seed.parent else {
            continue;
        };
        let Some(&child_id) = ids.get(&seed.name) else {
            continue;
        };
        match ids.get(parent_name) {
            Some(&parent_id) => {
                store.set_permission_parent(child_id, parent_id).await?;
            }
            None => {
                warn!(
                    permission = %seed.name,
                    parent = %parent_name,
                    "parent permission not declared; leaving unlinked"
                );
            }
        }
    }
    Ok(())
}

async fn insert_roles(
    store: &dyn MetadataStore,
    data: &SeedData,
    permission_ids: &HashMap<String, Uuid>,
    outcome: &mut SeedOutcome,
) -> Result<(), Error> {
    for seed in &data.roles {
        let role_id = store.insert_role(&seed.name).await?;
        outcome.roles_inserted += 1;
        for permission_name in &seed.permissions {
            match permission_ids.get(permission_name) {
                Some(&permission_id) => {
                    store.link_role_permission(role_id, permission_id).await?;
                    outcome.links_created += 1;
                }
                None => {
                    warn!(
                        role = %seed.name,
                        permission = %permission_name,
                        "permission not declared; skipping link"
                    );
                }
            }
        }
    }
    if outcome.roles_inserted > 0 {
        info!(
            roles = outcome.roles_inserted,
            links = outcome.links_created,
            "seeded roles"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn sample_seed() -> SeedData {
        SeedData {
            permissions: vec![
                PermissionSeed {
                    name: "User Management".into(),
                    permission: "user:*".into(),
                    description: Some("Manage user accounts".into()),
                    parent: None,
                },
                PermissionSeed {
                    // Declared before its parent on purpose: the two-pass
                    // patch must not care about declaration order.
                    name: "Download Report".into(),
                    permission: "report:download".into(),
                    description: None,
                    parent: Some("Report Viewing".into()),
                },
                PermissionSeed {
                    name: "Create User".into(),
                    permission: "user:create".into(),
                    description: None,
                    parent: Some("User Management".into()),
                },
                PermissionSeed {
                    name: "Report Viewing".into(),
                    permission: "report:*".into(),
                    description: None,
                    parent: None,
                },
            ],
            roles: vec![
                RoleSeed {
                    name: "SYSTEM_ADMINISTRATOR".into(),
                    permissions: vec!["User Management".into(), "Report Viewing".into()],
                },
                RoleSeed {
                    name: "USER".into(),
                    permissions: vec!["Report Viewing".into()],
                },
            ],
        }
    }

    #[tokio::test]
    async fn seeds_an_empty_store() {
        let store = MemoryStore::new();
        let outcome = seed(&store, &sample_seed()).await.unwrap();
        assert_eq!(outcome.permissions_inserted, 4);
        assert_eq!(outcome.roles_inserted, 2);
        assert_eq!(outcome.links_created, 3);

        assert_eq!(store.role_names().await, vec!["SYSTEM_ADMINISTRATOR", "USER"]);
        let admin = store
            .permission_strings_for_role("SYSTEM_ADMINISTRATOR")
            .await;
        assert!(admin.contains("user:*"));
        assert!(admin.contains("report:*"));
    }

    #[tokio::test]
    async fn parent_links_resolve_by_name_across_declaration_order() {
        let store = MemoryStore::new();
        seed(&store, &sample_seed()).await.unwrap();
        assert_eq!(
            store.permission_parent_name("Create User").await.as_deref(),
            Some("User Management")
        );
        // Parent declared after the child still resolves.
        assert_eq!(
            store
                .permission_parent_name("Download Report")
                .await
                .as_deref(),
            Some("Report Viewing")
        );
        assert_eq!(store.permission_parent_name("User Management").await, None);
    }

    #[tokio::test]
    async fn seeding_twice_is_a_noop() {
        let store = MemoryStore::new();
        seed(&store, &sample_seed()).await.unwrap();
        let second = seed(&store, &sample_seed()).await.unwrap();
        assert_eq!(second, SeedOutcome::default());
        assert_eq!(store.role_names().await.len(), 2);
    }

    #[tokio::test]
    async fn undeclared_names_are_skipped_not_linked() {
        let store = MemoryStore::new();
        let data = SeedData {
            permissions: vec![PermissionSeed {
                name: "Orphan".into(),
                permission: "orphan:view".into(),
                description: None,
                parent: Some("Nowhere".into()),
            }],
            roles: vec![RoleSeed {
                name: "GUEST".into(),
                permissions: vec!["Missing".into()],
            }],
        };
        let outcome = seed(&store, &data).await.unwrap();
        assert_eq!(outcome.permissions_inserted, 1);
        assert_eq!(outcome.roles_inserted, 1);
        assert_eq!(outcome.links_created, 0);
        assert_eq!(store.permission_parent_name("Orphan").await, None);
    }
}
