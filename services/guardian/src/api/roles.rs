//! Role API handlers.
//!
//! # Purpose and responsibility
//! CRUD over roles, addressed by `(role_id, app_id)`. Reads return each role with its nested
//! permissions; writes replace the role's permission set.
//!
//! # Key invariants and assumptions
//! - `GET /roles` accepts only the `app_id` query parameter; anything else is a 400.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::AckResponse;
use crate::app::AppState;
use crate::model::{Role, RoleKey};
use crate::store::RoleFilter;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};

#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    params(RoleFilter),
    responses(
        (status = 200, description = "Roles with nested permissions", body = [Role]),
        (status = 400, description = "Unsupported filter", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_roles(
    State(state): State<AppState>,
    filter: Result<Query<RoleFilter>, QueryRejection>,
) -> Result<Json<Vec<Role>>, ApiError> {
    let Query(filter) = filter.map_err(|rejection| api_validation_error(&rejection.body_text()))?;
    let roles = state
        .service
        .list_roles(&state.request_context(), &filter.normalized())
        .await?;
    Ok(Json(roles))
}

#[utoipa::path(
    get,
    path = "/roles/{role_id}/{app_id}",
    tag = "roles",
    params(
        ("role_id" = String, Path, description = "Role identifier"),
        ("app_id" = String, Path, description = "Owning application")
    ),
    responses(
        (status = 200, description = "Fetch role with permissions", body = Role),
        (status = 404, description = "Role not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_role(
    Path((id, app_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<Role>, ApiError> {
    let key = RoleKey { id, app_id };
    let role = state
        .service
        .get_role(&state.request_context(), &key)
        .await?;
    Ok(Json(role))
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "roles",
    request_body = Role,
    responses(
        (status = 200, description = "Role created or updated", body = AckResponse),
        (status = 400, description = "Invalid role", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Referenced application or permission missing", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn upsert_role(
    State(state): State<AppState>,
    Json(body): Json<Role>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .service
        .upsert_role(&state.request_context(), &body)
        .await?;
    Ok(Json(AckResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/roles/{role_id}/{app_id}",
    tag = "roles",
    params(
        ("role_id" = String, Path, description = "Role identifier"),
        ("app_id" = String, Path, description = "Owning application")
    ),
    responses(
        (status = 200, description = "Role deleted (or already absent)", body = AckResponse)
    )
)]
pub(crate) async fn delete_role(
    Path((id, app_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<AckResponse>, ApiError> {
    let key = RoleKey { id, app_id };
    state
        .service
        .delete_role(&state.request_context(), &key)
        .await?;
    Ok(Json(AckResponse::ok()))
}
