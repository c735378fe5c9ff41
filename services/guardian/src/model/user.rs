//! User model definitions.
//!
//! # Purpose
//! Defines an identity holding a set of roles, possibly across applications.
use super::{Role, RoleKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct User {
    pub username: String,
    pub roles: Vec<Role>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<Timestamp>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub updated_at: Option<Timestamp>,
}

impl User {
    /// Distinct role keys this user should hold, ordered by `(id, app_id)`.
    pub fn role_keys(&self) -> BTreeSet<RoleKey> {
        self.roles.iter().map(Role::key).collect()
    }
}
