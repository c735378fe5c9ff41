//! Access service facade.
//!
//! # Purpose
//! [`AccessService`] is the single entry point the HTTP layer uses. It validates inputs, runs
//! each store operation under the caller's [`RequestContext`] and turns store failures into the
//! [`ServiceError`] taxonomy.
//!
//! # Key invariants
//! - Malformed input is rejected with [`ServiceError::Invalid`] before any statement is issued.
//! - Every store call races the context deadline and cancellation token. The store future is
//!   dropped when it loses, which rolls back any open transaction.
//! - No retries happen here. Callers decide based on [`ServiceError::is_retryable`].
use crate::model::{Application, Permission, PermissionKey, Role, RoleKey, User};
use crate::store::{AccessStore, RoleFilter, StoreError, StoreResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Upper bound on a health probe regardless of the caller's deadline.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

/// Deadline and cancellation scope for one facade call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token, typically with a child of a shutdown token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Same scope with the deadline pulled in to at most `limit` from now.
    pub fn capped(&self, limit: Duration) -> Self {
        Self {
            deadline: self.deadline.min(Instant::now() + limit),
            cancel: self.cancel.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("internal error")]
    Internal(#[source] StoreError),
}

impl ServiceError {
    /// Metric label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Invalid(_) => "invalid",
            ServiceError::ConstraintViolation(_) => "constraint_violation",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// Transient failures that may succeed if the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::ConstraintViolation(message) => ServiceError::ConstraintViolation(message),
            StoreError::Unavailable(message) => ServiceError::Unavailable(message),
            other @ StoreError::Unexpected(_) => ServiceError::Internal(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

fn require(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Invalid(format!("{field} is required")));
    }
    Ok(())
}

fn validate_role(role: &Role) -> ServiceResult<()> {
    require("id", &role.id)?;
    require("app_id", &role.app_id)?;
    for permission in &role.permissions {
        require("permissions[].id", &permission.id)?;
        if !permission.app_id.is_empty() && permission.app_id != role.app_id {
            return Err(ServiceError::Invalid(format!(
                "permission {} belongs to app {}, not {}",
                permission.id, permission.app_id, role.app_id
            )));
        }
    }
    Ok(())
}

fn validate_user(user: &User) -> ServiceResult<()> {
    require("username", &user.username)?;
    for role in &user.roles {
        require("roles[].id", &role.id)?;
        require("roles[].app_id", &role.app_id)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct AccessService {
    store: Arc<dyn AccessStore>,
}

impl AccessService {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_durable()
    }

    async fn run<T, F>(&self, op: &'static str, ctx: &RequestContext, call: F) -> ServiceResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let started = std::time::Instant::now();
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                Err(ServiceError::Unavailable("request cancelled".into()))
            }
            _ = tokio::time::sleep_until(ctx.deadline) => {
                Err(ServiceError::Unavailable("deadline exceeded".into()))
            }
            result = call => result.map_err(ServiceError::from),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!("guardian_store_operations_total", "op" => op, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("guardian_store_operation_seconds", "op" => op)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Err(err @ ServiceError::Internal(_)) => {
                tracing::error!(op, error = ?err, "store operation failed");
            }
            Err(err @ ServiceError::Unavailable(_)) => {
                tracing::warn!(op, error = %err, "store operation unavailable");
            }
            Err(err) => tracing::debug!(op, error = %err, "store operation rejected"),
            Ok(_) => {}
        }
        result
    }

    pub async fn list_apps(&self, ctx: &RequestContext) -> ServiceResult<Vec<Application>> {
        self.run("list_apps", ctx, self.store.list_apps()).await
    }

    pub async fn get_app(&self, ctx: &RequestContext, app_id: &str) -> ServiceResult<Application> {
        require("app_id", app_id)?;
        self.run("get_app", ctx, self.store.get_app(app_id)).await
    }

    pub async fn upsert_app(&self, ctx: &RequestContext, app: &Application) -> ServiceResult<()> {
        require("id", &app.id)?;
        self.run("upsert_app", ctx, self.store.upsert_app(app)).await
    }

    pub async fn delete_app(&self, ctx: &RequestContext, app_id: &str) -> ServiceResult<()> {
        require("app_id", app_id)?;
        self.run("delete_app", ctx, self.store.delete_app(app_id)).await
    }

    pub async fn list_permissions(&self, ctx: &RequestContext) -> ServiceResult<Vec<Permission>> {
        self.run("list_permissions", ctx, self.store.list_permissions()).await
    }

    pub async fn get_permission(
        &self,
        ctx: &RequestContext,
        key: &PermissionKey,
    ) -> ServiceResult<Permission> {
        require("id", &key.id)?;
        require("app_id", &key.app_id)?;
        self.run("get_permission", ctx, self.store.get_permission(key)).await
    }

    pub async fn upsert_permission(
        &self,
        ctx: &RequestContext,
        permission: &Permission,
    ) -> ServiceResult<()> {
        require("id", &permission.id)?;
        require("app_id", &permission.app_id)?;
        self.run("upsert_permission", ctx, self.store.upsert_permission(permission)).await
    }

    pub async fn delete_permission(
        &self,
        ctx: &RequestContext,
        key: &PermissionKey,
    ) -> ServiceResult<()> {
        require("id", &key.id)?;
        require("app_id", &key.app_id)?;
        self.run("delete_permission", ctx, self.store.delete_permission(key)).await
    }

    pub async fn list_roles(
        &self,
        ctx: &RequestContext,
        filter: &RoleFilter,
    ) -> ServiceResult<Vec<Role>> {
        self.run("list_roles", ctx, self.store.list_roles(filter)).await
    }

    pub async fn get_role(&self, ctx: &RequestContext, key: &RoleKey) -> ServiceResult<Role> {
        require("id", &key.id)?;
        require("app_id", &key.app_id)?;
        self.run("get_role", ctx, self.store.get_role(key)).await
    }

    pub async fn upsert_role(&self, ctx: &RequestContext, role: &Role) -> ServiceResult<()> {
        validate_role(role)?;
        self.run("upsert_role", ctx, self.store.upsert_role(role)).await
    }

    pub async fn delete_role(&self, ctx: &RequestContext, key: &RoleKey) -> ServiceResult<()> {
        require("id", &key.id)?;
        require("app_id", &key.app_id)?;
        self.run("delete_role", ctx, self.store.delete_role(key)).await
    }

    pub async fn list_users(&self, ctx: &RequestContext) -> ServiceResult<Vec<User>> {
        self.run("list_users", ctx, self.store.list_users()).await
    }

    pub async fn get_user(&self, ctx: &RequestContext, username: &str) -> ServiceResult<User> {
        require("username", username)?;
        self.run("get_user", ctx, self.store.get_user(username)).await
    }

    pub async fn upsert_user(&self, ctx: &RequestContext, user: &User) -> ServiceResult<()> {
        validate_user(user)?;
        self.run("upsert_user", ctx, self.store.upsert_user(user)).await
    }

    pub async fn delete_user(&self, ctx: &RequestContext, username: &str) -> ServiceResult<()> {
        require("username", username)?;
        self.run("delete_user", ctx, self.store.delete_user(username)).await
    }

    /// Probe the backend, bounded by [`HEALTH_TIMEOUT`].
    pub async fn health(&self, ctx: &RequestContext) -> ServiceResult<()> {
        let ctx = ctx.capped(HEALTH_TIMEOUT);
        self.run("health", &ctx, self.store.health_check()).await
    }
}
