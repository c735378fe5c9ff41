//! Role model definitions.
//!
//! # Purpose
//! Defines a named set of permissions scoped to one application.
//!
//! # Notes
//! `permissions` is a set: writes deduplicate by permission id, reads return it ordered by id.
//! Every permission belongs to the role's own `app_id`.
use super::{Permission, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleKey {
    pub id: String,
    pub app_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Role {
    pub id: String,
    pub app_id: String,
    pub name: String,
    pub description: String,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<Timestamp>,
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn key(&self) -> RoleKey {
        RoleKey {
            id: self.id.clone(),
            app_id: self.app_id.clone(),
        }
    }

    /// Distinct permission ids this role should be associated with, in id order.
    pub fn permission_ids(&self) -> BTreeSet<&str> {
        self.permissions.iter().map(|perm| perm.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_ids_deduplicate_and_sort() {
        let role = Role {
            id: "admin".to_string(),
            app_id: "billing".to_string(),
            permissions: ["write", "read", "write"]
                .into_iter()
                .map(|id| Permission {
                    id: id.to_string(),
                    ..Permission::default()
                })
                .collect(),
            ..Role::default()
        };
        let ids: Vec<_> = role.permission_ids().into_iter().collect();
        assert_eq!(ids, vec!["read", "write"]);
    }

    #[test]
    fn key_only_reference_deserializes() {
        let role: Role = serde_json::from_value(serde_json::json!({
            "id": "admin",
            "app_id": "billing",
            "permissions": [{ "id": "read" }]
        }))
        .expect("role");
        assert_eq!(role.permissions.len(), 1);
        assert_eq!(role.permissions[0].id, "read");
        assert!(role.created_at.is_none());
    }
}
