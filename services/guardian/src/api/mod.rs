//! HTTP API module.
//!
//! # Purpose
//! Route handlers for the RBAC hierarchy. Handlers only translate HTTP to facade calls; all
//! validation and error classification lives in [`crate::service`].
pub mod apps;
pub mod error;
pub mod openapi;
pub mod permissions;
pub mod roles;
pub mod system;
pub mod types;
pub mod users;
