//! Permission model definitions.
//!
//! # Purpose
//! Defines an atomic grantable capability scoped to one application, plus its natural key.
use super::Timestamp;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionKey {
    pub id: String,
    pub app_id: String,
}

/// A permission row.
///
/// `created_at` is assigned by the store; inbound payloads may leave it out.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Permission {
    pub id: String,
    pub app_id: String,
    pub name: String,
    pub description: String,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<Timestamp>,
}

impl Permission {
    pub fn key(&self) -> PermissionKey {
        PermissionKey {
            id: self.id.clone(),
            app_id: self.app_id.clone(),
        }
    }
}
