//! Guardian data model.
//!
//! # Purpose
//! Re-exports the RBAC entities (applications, permissions, roles, users), their natural keys,
//! and the timestamp type shared by the store, service, and API layers.
mod application;
mod permission;
mod role;
mod timestamp;
mod user;

pub use application::Application;
pub use permission::{Permission, PermissionKey};
pub use role::{Role, RoleKey};
pub use timestamp::Timestamp;
pub use user::User;
