//! In-memory implementation of the access store.
//!
//! # Purpose
//! Implements [`AccessStore`] entirely in memory. It exists for local development, for tests
//! that need no database, and for deployments that do not need durability.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - All tables live behind one `tokio::sync::RwLock`. A write validates every reference first
//!   and only then mutates, so a rejected write leaves no trace, which mirrors a rolled-back
//!   Postgres transaction.
//! - Referential rules match the Postgres schema: writes that name a missing parent fail with
//!   [`StoreError::ConstraintViolation`], and deletes cascade to dependents.
//!
//! # Reads
//! Aggregated reads emit the same flat rows the SQL joins would, in the same order, and fold
//! them with [`super::aggregate`], so both backends share one assembly path.
use super::aggregate::{RoleRow, UserRow, fold_roles, fold_users};
use super::{AccessStore, RoleFilter, StoreError, StoreResult};
use crate::model::{Application, Permission, PermissionKey, Role, RoleKey, User};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// `(app_id, id)`; ordering the maps by app first matches the SQL `ORDER BY`.
type ScopedKey = (String, String);

#[derive(Debug, Clone)]
struct Record {
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct UserRecord {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    apps: BTreeMap<String, Application>,
    permissions: BTreeMap<ScopedKey, Record>,
    roles: BTreeMap<ScopedKey, Record>,
    /// `(app_id, role_id, permission_id)`
    role_permissions: BTreeSet<(String, String, String)>,
    users: BTreeMap<String, UserRecord>,
    /// `(username, app_id, role_id)`
    user_roles: BTreeSet<(String, String, String)>,
}

impl Tables {
    fn permission_ids_of<'a>(
        &'a self,
        app_id: &'a str,
        role_id: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.role_permissions
            .iter()
            .filter(move |(app, role, _)| app == app_id && role == role_id)
            .map(|(_, _, permission_id)| permission_id.as_str())
    }

    fn role_rows(&self, app_id: &str, role_id: &str, role: &Record) -> Vec<RoleRow> {
        let mut rows: Vec<RoleRow> = self
            .permission_ids_of(app_id, role_id)
            .filter_map(|permission_id| {
                let key = (app_id.to_string(), permission_id.to_string());
                self.permissions.get(&key).map(|perm| RoleRow {
                    role_id: role_id.to_string(),
                    role_app_id: app_id.to_string(),
                    role_name: role.name.clone(),
                    role_description: role.description.clone(),
                    role_created_at: role.created_at,
                    perm_id: Some(permission_id.to_string()),
                    perm_name: Some(perm.name.clone()),
                    perm_description: Some(perm.description.clone()),
                    perm_created_at: Some(perm.created_at),
                })
            })
            .collect();
        if rows.is_empty() {
            rows.push(RoleRow {
                role_id: role_id.to_string(),
                role_app_id: app_id.to_string(),
                role_name: role.name.clone(),
                role_description: role.description.clone(),
                role_created_at: role.created_at,
                perm_id: None,
                perm_name: None,
                perm_description: None,
                perm_created_at: None,
            });
        }
        rows
    }

    fn user_rows(&self, username: &str, user: UserRecord) -> Vec<UserRow> {
        let mut rows = Vec::new();
        for (_, app_id, role_id) in self
            .user_roles
            .iter()
            .filter(|(holder, _, _)| holder == username)
        {
            let Some(role) = self.roles.get(&(app_id.clone(), role_id.clone())) else {
                continue;
            };
            rows.extend(
                self.role_rows(app_id, role_id, role)
                    .into_iter()
                    .map(|row| UserRow {
                        username: username.to_string(),
                        user_created_at: user.created_at,
                        user_updated_at: user.updated_at,
                        role_id: Some(row.role_id),
                        role_app_id: Some(row.role_app_id),
                        role_name: Some(row.role_name),
                        role_description: Some(row.role_description),
                        role_created_at: Some(row.role_created_at),
                        perm_id: row.perm_id,
                        perm_name: row.perm_name,
                        perm_description: row.perm_description,
                        perm_created_at: row.perm_created_at,
                    }),
            );
        }
        if rows.is_empty() {
            rows.push(UserRow {
                username: username.to_string(),
                user_created_at: user.created_at,
                user_updated_at: user.updated_at,
                role_id: None,
                role_app_id: None,
                role_name: None,
                role_description: None,
                role_created_at: None,
                perm_id: None,
                perm_name: None,
                perm_description: None,
                perm_created_at: None,
            });
        }
        rows
    }

    fn collect_roles(&self, filter: &RoleFilter) -> Vec<Role> {
        let rows = self
            .roles
            .iter()
            .filter(|((app_id, id), _)| {
                filter.matches(&RoleKey {
                    id: id.clone(),
                    app_id: app_id.clone(),
                })
            })
            .flat_map(|((app_id, id), role)| self.role_rows(app_id, id, role));
        fold_roles(rows)
    }

    /// Users ordered most recently updated first, ties by username.
    fn collect_users(&self, only: Option<&str>) -> Vec<User> {
        let mut users: Vec<(&String, UserRecord)> = self
            .users
            .iter()
            .filter(|(username, _)| only.is_none_or(|wanted| wanted == username.as_str()))
            .map(|(username, record)| (username, *record))
            .collect();
        users.sort_by_key(|(username, record)| (Reverse(record.updated_at), *username));
        fold_users(
            users
                .into_iter()
                .flat_map(|(username, record)| self.user_rows(username, record)),
        )
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn missing(what: &str, key: &str) -> StoreError {
    StoreError::ConstraintViolation(format!("{what} {key} does not exist"))
}

/// Non-durable store for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessStore for InMemoryStore {
    async fn list_apps(&self) -> StoreResult<Vec<Application>> {
        Ok(self.tables.read().await.apps.values().cloned().collect())
    }

    async fn get_app(&self, app_id: &str) -> StoreResult<Application> {
        self.tables
            .read()
            .await
            .apps
            .get(app_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("application".into()))
    }

    async fn upsert_app(&self, app: &Application) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .apps
            .insert(app.id.clone(), app.clone());
        Ok(())
    }

    async fn delete_app(&self, app_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.apps.remove(app_id);
        tables.permissions.retain(|(app, _), _| app != app_id);
        tables.roles.retain(|(app, _), _| app != app_id);
        tables.role_permissions.retain(|(app, _, _)| app != app_id);
        tables.user_roles.retain(|(_, app, _)| app != app_id);
        Ok(())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .iter()
            .map(|((app_id, id), record)| Permission {
                id: id.clone(),
                app_id: app_id.clone(),
                name: record.name.clone(),
                description: record.description.clone(),
                created_at: Some(record.created_at.into()),
            })
            .collect())
    }

    async fn get_permission(&self, key: &PermissionKey) -> StoreResult<Permission> {
        let tables = self.tables.read().await;
        tables
            .permissions
            .get(&(key.app_id.clone(), key.id.clone()))
            .map(|record| Permission {
                id: key.id.clone(),
                app_id: key.app_id.clone(),
                name: record.name.clone(),
                description: record.description.clone(),
                created_at: Some(record.created_at.into()),
            })
            .ok_or_else(|| StoreError::NotFound("permission".into()))
    }

    async fn upsert_permission(&self, permission: &Permission) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.apps.contains_key(&permission.app_id) {
            return Err(missing("application", &permission.app_id));
        }
        let key = (permission.app_id.clone(), permission.id.clone());
        let created_at = tables
            .permissions
            .get(&key)
            .map_or_else(now, |existing| existing.created_at);
        tables.permissions.insert(
            key,
            Record {
                name: permission.name.clone(),
                description: permission.description.clone(),
                created_at,
            },
        );
        Ok(())
    }

    async fn delete_permission(&self, key: &PermissionKey) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .permissions
            .remove(&(key.app_id.clone(), key.id.clone()));
        tables
            .role_permissions
            .retain(|(app, _, permission)| !(app == &key.app_id && permission == &key.id));
        Ok(())
    }

    async fn list_roles(&self, filter: &RoleFilter) -> StoreResult<Vec<Role>> {
        Ok(self.tables.read().await.collect_roles(filter))
    }

    async fn get_role(&self, key: &RoleKey) -> StoreResult<Role> {
        let tables = self.tables.read().await;
        let record = tables
            .roles
            .get(&(key.app_id.clone(), key.id.clone()))
            .ok_or_else(|| StoreError::NotFound("role".into()))?;
        fold_roles(tables.role_rows(&key.app_id, &key.id, record))
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("role".into()))
    }

    async fn upsert_role(&self, role: &Role) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.apps.contains_key(&role.app_id) {
            return Err(missing("application", &role.app_id));
        }
        let permission_ids = role.permission_ids();
        for permission_id in &permission_ids {
            let key = (role.app_id.clone(), permission_id.to_string());
            if !tables.permissions.contains_key(&key) {
                return Err(missing(
                    "permission",
                    &format!("{permission_id}/{}", role.app_id),
                ));
            }
        }

        let key = (role.app_id.clone(), role.id.clone());
        let created_at = tables
            .roles
            .get(&key)
            .map_or_else(now, |existing| existing.created_at);
        tables.roles.insert(
            key,
            Record {
                name: role.name.clone(),
                description: role.description.clone(),
                created_at,
            },
        );
        tables
            .role_permissions
            .retain(|(app, id, _)| !(app == &role.app_id && id == &role.id));
        for permission_id in permission_ids {
            tables.role_permissions.insert((
                role.app_id.clone(),
                role.id.clone(),
                permission_id.to_string(),
            ));
        }
        Ok(())
    }

    async fn delete_role(&self, key: &RoleKey) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.roles.remove(&(key.app_id.clone(), key.id.clone()));
        tables
            .role_permissions
            .retain(|(app, id, _)| !(app == &key.app_id && id == &key.id));
        tables
            .user_roles
            .retain(|(_, app, id)| !(app == &key.app_id && id == &key.id));
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().await.collect_users(None))
    }

    async fn get_user(&self, username: &str) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .collect_users(Some(username))
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let role_keys = user.role_keys();
        for key in &role_keys {
            if !tables
                .roles
                .contains_key(&(key.app_id.clone(), key.id.clone()))
            {
                return Err(missing("role", &format!("{}/{}", key.id, key.app_id)));
            }
        }

        let stamp = now();
        let record = match tables.users.get(&user.username) {
            Some(existing) => UserRecord {
                created_at: existing.created_at,
                updated_at: existing.updated_at.max(stamp),
            },
            None => UserRecord {
                created_at: stamp,
                updated_at: stamp,
            },
        };
        tables.users.insert(user.username.clone(), record);
        tables
            .user_roles
            .retain(|(holder, _, _)| holder != &user.username);
        for key in role_keys {
            tables
                .user_roles
                .insert((user.username.clone(), key.app_id, key.id));
        }
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.users.remove(username);
        tables.user_roles.retain(|(holder, _, _)| holder != username);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str) -> Application {
        Application {
            id: id.to_string(),
            name: format!("{id} app"),
            description: String::new(),
        }
    }

    fn permission(id: &str, app_id: &str) -> Permission {
        Permission {
            id: id.to_string(),
            app_id: app_id.to_string(),
            name: format!("{id} permission"),
            ..Permission::default()
        }
    }

    fn role(id: &str, app_id: &str, permissions: &[&str]) -> Role {
        Role {
            id: id.to_string(),
            app_id: app_id.to_string(),
            name: format!("{id} role"),
            permissions: permissions
                .iter()
                .map(|perm| permission(perm, app_id))
                .collect(),
            ..Role::default()
        }
    }

    fn user(username: &str, roles: &[(&str, &str)]) -> User {
        User {
            username: username.to_string(),
            roles: roles
                .iter()
                .map(|(id, app_id)| role(id, app_id, &[]))
                .collect(),
            ..User::default()
        }
    }

    fn role_key(id: &str, app_id: &str) -> RoleKey {
        RoleKey {
            id: id.to_string(),
            app_id: app_id.to_string(),
        }
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.upsert_app(&app("billing")).await.unwrap();
        store.upsert_app(&app("crm")).await.unwrap();
        for (perm, app_id) in [("read", "billing"), ("write", "billing"), ("read", "crm")] {
            store.upsert_permission(&permission(perm, app_id)).await.unwrap();
        }
        store
            .upsert_role(&role("admin", "billing", &["read", "write"]))
            .await
            .unwrap();
        store.upsert_role(&role("viewer", "crm", &["read"])).await.unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_and_keeps_created_at() {
        let store = seeded().await;
        let first = store.get_role(&role_key("admin", "billing")).await.unwrap();
        let ids: Vec<_> = first.permissions.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["read", "write"]);
        assert!(first.created_at.is_some());

        let mut renamed = role("admin", "billing", &["read"]);
        renamed.name = "Administrators".to_string();
        store.upsert_role(&renamed).await.unwrap();
        let second = store.get_role(&role_key("admin", "billing")).await.unwrap();
        assert_eq!(second.name, "Administrators");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.permissions.len(), 1);
    }

    #[tokio::test]
    async fn role_with_missing_permission_is_rejected_without_side_effects() {
        let store = seeded().await;
        let err = store
            .upsert_role(&role("admin", "billing", &["read", "delete"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
        let unchanged = store.get_role(&role_key("admin", "billing")).await.unwrap();
        assert_eq!(unchanged.permissions.len(), 2);
    }

    #[tokio::test]
    async fn writes_under_missing_app_are_constraint_violations() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.upsert_permission(&permission("read", "ghost")).await,
            Err(StoreError::ConstraintViolation(_))
        ));
        assert!(matches!(
            store.upsert_role(&role("admin", "ghost", &[])).await,
            Err(StoreError::ConstraintViolation(_))
        ));
        assert!(matches!(
            store.upsert_user(&user("alice", &[("admin", "ghost")])).await,
            Err(StoreError::ConstraintViolation(_))
        ));
        assert!(matches!(
            store.get_user("alice").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_roles_scopes_by_app() {
        let store = seeded().await;
        let all = store.list_roles(&RoleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        let crm = store.list_roles(&RoleFilter::for_app("crm")).await.unwrap();
        assert_eq!(crm.len(), 1);
        assert_eq!(crm[0].id, "viewer");
        assert!(crm.iter().all(|r| r.app_id == "crm"));
        let none = store.list_roles(&RoleFilter::for_app("nope")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn user_roles_are_replaced_wholesale() {
        let store = seeded().await;
        store
            .upsert_user(&user("alice", &[("admin", "billing"), ("viewer", "crm")]))
            .await
            .unwrap();
        let first = store.get_user("alice").await.unwrap();
        assert_eq!(first.roles.len(), 2);
        assert_eq!(first.roles[0].permissions.len(), 2);

        store
            .upsert_user(&user("alice", &[("viewer", "crm")]))
            .await
            .unwrap();
        let second = store.get_user("alice").await.unwrap();
        assert_eq!(second.roles.len(), 1);
        assert_eq!(second.roles[0].app_id, "crm");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        store.upsert_user(&user("alice", &[])).await.unwrap();
        assert!(store.get_user("alice").await.unwrap().roles.is_empty());
    }

    #[tokio::test]
    async fn deletes_cascade_and_are_idempotent() {
        let store = seeded().await;
        store
            .upsert_user(&user("alice", &[("admin", "billing"), ("viewer", "crm")]))
            .await
            .unwrap();

        store
            .delete_permission(&PermissionKey {
                id: "write".to_string(),
                app_id: "billing".to_string(),
            })
            .await
            .unwrap();
        let admin = store.get_role(&role_key("admin", "billing")).await.unwrap();
        assert_eq!(admin.permissions.len(), 1);

        store.delete_app("billing").await.unwrap();
        store.delete_app("billing").await.unwrap();
        assert!(matches!(
            store.get_role(&role_key("admin", "billing")).await,
            Err(StoreError::NotFound(_))
        ));
        let alice = store.get_user("alice").await.unwrap();
        assert_eq!(alice.roles.len(), 1);
        assert_eq!(alice.roles[0].id, "viewer");
        assert!(
            store
                .list_permissions()
                .await
                .unwrap()
                .iter()
                .all(|p| p.app_id == "crm")
        );

        store.delete_user("alice").await.unwrap();
        store.delete_user("alice").await.unwrap();
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn users_list_most_recently_updated_first() {
        let store = seeded().await;
        store.upsert_user(&user("bob", &[])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.upsert_user(&user("alice", &[])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.upsert_user(&user("bob", &[("viewer", "crm")])).await.unwrap();

        let names: Vec<_> = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["bob", "alice"]);
    }

    #[tokio::test]
    async fn flat_reads_are_ordered_by_key() {
        let store = seeded().await;
        let apps: Vec<_> = store
            .list_apps()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(apps, vec!["billing", "crm"]);
        let permissions: Vec<_> = store
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| format!("{}/{}", p.app_id, p.id))
            .collect();
        assert_eq!(permissions, vec!["billing/read", "billing/write", "crm/read"]);
        assert!(matches!(
            store.get_app("ghost").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
