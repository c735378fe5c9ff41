//! Join-then-fold assembly of nested read views.
//!
//! # What this module is
//! Every aggregated read (roles with their permissions, users with their roles and each role's
//! permissions) is served by a single flat `LEFT JOIN` query. Each result row carries the parent
//! columns plus nullable child columns. The functions here fold those rows back into the nested
//! entity tree.
//!
//! # Key invariants
//! - Outer-join semantics: a parent with zero children still produces one row whose child
//!   columns are all `NULL`, and folds to an empty (never missing) nested collection.
//! - Parent order is the order of first appearance in the row stream; the SQL `ORDER BY`
//!   therefore defines list ordering. Postgres sorts ids with `COLLATE "C"`, which is the byte
//!   order the in-memory backend gets from its `BTreeMap` keys.
//! - Rows for the same parent do not need to be contiguous; grouping is by natural key.
//! - A nested permission inherits its role's `app_id`; the schema guarantees they match.
use crate::model::{Permission, Role, RoleKey, Timestamp, User};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::collections::HashMap;

/// One row of `roles LEFT JOIN role_permissions LEFT JOIN permissions`.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct RoleRow {
    pub role_id: String,
    pub role_app_id: String,
    pub role_name: String,
    pub role_description: String,
    pub role_created_at: DateTime<Utc>,
    pub perm_id: Option<String>,
    pub perm_name: Option<String>,
    pub perm_description: Option<String>,
    pub perm_created_at: Option<DateTime<Utc>>,
}

/// One row of `users LEFT JOIN user_roles LEFT JOIN roles LEFT JOIN role_permissions
/// LEFT JOIN permissions`.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct UserRow {
    pub username: String,
    pub user_created_at: DateTime<Utc>,
    pub user_updated_at: DateTime<Utc>,
    pub role_id: Option<String>,
    pub role_app_id: Option<String>,
    pub role_name: Option<String>,
    pub role_description: Option<String>,
    pub role_created_at: Option<DateTime<Utc>>,
    pub perm_id: Option<String>,
    pub perm_name: Option<String>,
    pub perm_description: Option<String>,
    pub perm_created_at: Option<DateTime<Utc>>,
}

/// Nullable permission columns of a joined row.
struct PermissionColumns {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl PermissionColumns {
    fn into_permission(self, app_id: &str) -> Option<Permission> {
        Some(Permission {
            id: self.id?,
            app_id: app_id.to_string(),
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            created_at: self.created_at.map(Timestamp::from),
        })
    }
}

#[derive(Default)]
struct RoleFolder {
    roles: Vec<Role>,
    index: HashMap<RoleKey, usize>,
}

impl RoleFolder {
    fn entry(&mut self, key: RoleKey, make: impl FnOnce() -> Role) -> &mut Role {
        let position = match self.index.get(&key) {
            Some(position) => *position,
            None => {
                self.roles.push(make());
                self.index.insert(key, self.roles.len() - 1);
                self.roles.len() - 1
            }
        };
        &mut self.roles[position]
    }

    fn fold_permission(role: &mut Role, columns: PermissionColumns) {
        let Some(permission) = columns.into_permission(&role.app_id) else {
            return;
        };
        if !role.permissions.iter().any(|p| p.id == permission.id) {
            role.permissions.push(permission);
        }
    }

    fn finish(self) -> Vec<Role> {
        self.roles
    }
}

/// Fold flat role rows into roles with nested permissions.
pub(crate) fn fold_roles(rows: impl IntoIterator<Item = RoleRow>) -> Vec<Role> {
    let mut folder = RoleFolder::default();
    for row in rows {
        let RoleRow {
            role_id,
            role_app_id,
            role_name,
            role_description,
            role_created_at,
            perm_id,
            perm_name,
            perm_description,
            perm_created_at,
        } = row;
        let key = RoleKey {
            id: role_id.clone(),
            app_id: role_app_id.clone(),
        };
        let role = folder.entry(key, || Role {
            id: role_id,
            app_id: role_app_id,
            name: role_name,
            description: role_description,
            created_at: Some(Timestamp::from(role_created_at)),
            permissions: Vec::new(),
        });
        RoleFolder::fold_permission(
            role,
            PermissionColumns {
                id: perm_id,
                name: perm_name,
                description: perm_description,
                created_at: perm_created_at,
            },
        );
    }
    folder.finish()
}

/// Fold flat user rows into the `user → roles → permissions` tree.
pub(crate) fn fold_users(rows: impl IntoIterator<Item = UserRow>) -> Vec<User> {
    let mut users: Vec<(User, RoleFolder)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let UserRow {
            username,
            user_created_at,
            user_updated_at,
            role_id,
            role_app_id,
            role_name,
            role_description,
            role_created_at,
            perm_id,
            perm_name,
            perm_description,
            perm_created_at,
        } = row;
        let position = match index.get(&username) {
            Some(position) => *position,
            None => {
                index.insert(username.clone(), users.len());
                users.push((
                    User {
                        username,
                        roles: Vec::new(),
                        created_at: Some(Timestamp::from(user_created_at)),
                        updated_at: Some(Timestamp::from(user_updated_at)),
                    },
                    RoleFolder::default(),
                ));
                users.len() - 1
            }
        };
        // A user without roles yields one row with NULL role columns.
        let (Some(role_id), Some(role_app_id)) = (role_id, role_app_id) else {
            continue;
        };
        let folder = &mut users[position].1;
        let key = RoleKey {
            id: role_id.clone(),
            app_id: role_app_id.clone(),
        };
        let role = folder.entry(key, || Role {
            id: role_id,
            app_id: role_app_id,
            name: role_name.unwrap_or_default(),
            description: role_description.unwrap_or_default(),
            created_at: role_created_at.map(Timestamp::from),
            permissions: Vec::new(),
        });
        RoleFolder::fold_permission(
            role,
            PermissionColumns {
                id: perm_id,
                name: perm_name,
                description: perm_description,
                created_at: perm_created_at,
            },
        );
    }
    users
        .into_iter()
        .map(|(mut user, folder)| {
            user.roles = folder.finish();
            user
        })
        .collect()
}
