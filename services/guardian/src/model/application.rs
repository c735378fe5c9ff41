//! Application model definitions.
//!
//! # Purpose
//! Defines the top-level scoping unit that owns permissions and roles.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub description: String,
}
