//! Storage layer for the RBAC hierarchy.
//!
//! # Purpose
//! Defines the [`AccessStore`] trait implemented by the in-memory and Postgres backends, the
//! typed read filters, and the error taxonomy every backend reports through.
//!
//! # Key invariants
//! - Association sets (role→permissions, user→roles) are replaced wholesale by upserts, and the
//!   replacement is atomic with the row upsert.
//! - Deletes are idempotent and cascade to dependent rows and associations.
//! - Single-entity reads report [`StoreError::NotFound`] rather than an empty value.
use crate::model::{Application, Permission, PermissionKey, Role, RoleKey, User};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

pub mod aggregate;
pub mod memory;
pub mod postgres;

/// Supported filters for listing roles.
///
/// Each populated field becomes one equality predicate; predicates are joined with `AND`.
/// Unknown query parameters are rejected at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
#[into_params(parameter_in = Query)]
pub struct RoleFilter {
    /// Only return roles owned by this application.
    pub app_id: Option<String>,
}

impl RoleFilter {
    pub fn for_app(app_id: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
        }
    }

    /// Drop blank values so `?app_id=` behaves like no filter.
    pub fn normalized(self) -> Self {
        Self {
            app_id: self.app_id.filter(|value| !value.trim().is_empty()),
        }
    }

    pub fn matches(&self, key: &RoleKey) -> bool {
        self.app_id
            .as_deref()
            .is_none_or(|app_id| app_id == key.app_id)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // SQLSTATE class 23: integrity constraint violation.
            sqlx::Error::Database(db_err)
                if db_err.code().is_some_and(|code| code.starts_with("23")) =>
            {
                StoreError::ConstraintViolation(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row".into()),
            sqlx::Error::PoolTimedOut => {
                StoreError::Unavailable("timed out acquiring a database connection".into())
            }
            sqlx::Error::PoolClosed => StoreError::Unavailable("connection pool closed".into()),
            sqlx::Error::Io(io_err) => StoreError::Unavailable(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => StoreError::Unavailable(tls_err.to_string()),
            sqlx::Error::WorkerCrashed => {
                StoreError::Unavailable("database connection worker crashed".into())
            }
            other => StoreError::Unexpected(other.into()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn list_apps(&self) -> StoreResult<Vec<Application>>;
    async fn get_app(&self, app_id: &str) -> StoreResult<Application>;
    async fn upsert_app(&self, app: &Application) -> StoreResult<()>;
    async fn delete_app(&self, app_id: &str) -> StoreResult<()>;

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>>;
    async fn get_permission(&self, key: &PermissionKey) -> StoreResult<Permission>;
    async fn upsert_permission(&self, permission: &Permission) -> StoreResult<()>;
    async fn delete_permission(&self, key: &PermissionKey) -> StoreResult<()>;

    async fn list_roles(&self, filter: &RoleFilter) -> StoreResult<Vec<Role>>;
    async fn get_role(&self, key: &RoleKey) -> StoreResult<Role>;
    async fn upsert_role(&self, role: &Role) -> StoreResult<()>;
    async fn delete_role(&self, key: &RoleKey) -> StoreResult<()>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn get_user(&self, username: &str) -> StoreResult<User>;
    async fn upsert_user(&self, user: &User) -> StoreResult<()>;
    async fn delete_user(&self, username: &str) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
