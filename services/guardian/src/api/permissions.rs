//! Permission API handlers.
//!
//! # Purpose and responsibility
//! CRUD over permissions, addressed by `(perm_id, app_id)`.
use crate::api::error::ApiError;
use crate::api::types::AckResponse;
use crate::app::AppState;
use crate::model::{Permission, PermissionKey};
use axum::Json;
use axum::extract::{Path, State};

#[utoipa::path(
    get,
    path = "/permissions",
    tag = "permissions",
    responses(
        (status = 200, description = "All permissions ordered by app and id", body = [Permission])
    )
)]
pub(crate) async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    let permissions = state
        .service
        .list_permissions(&state.request_context())
        .await?;
    Ok(Json(permissions))
}

#[utoipa::path(
    get,
    path = "/permissions/{perm_id}/{app_id}",
    tag = "permissions",
    params(
        ("perm_id" = String, Path, description = "Permission identifier"),
        ("app_id" = String, Path, description = "Owning application")
    ),
    responses(
        (status = 200, description = "Fetch permission", body = Permission),
        (status = 404, description = "Permission not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_permission(
    Path((id, app_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<Permission>, ApiError> {
    let key = PermissionKey { id, app_id };
    let permission = state
        .service
        .get_permission(&state.request_context(), &key)
        .await?;
    Ok(Json(permission))
}

#[utoipa::path(
    post,
    path = "/permissions",
    tag = "permissions",
    request_body = Permission,
    responses(
        (status = 200, description = "Permission created or updated", body = AckResponse),
        (status = 400, description = "Invalid permission", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Owning application does not exist", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn upsert_permission(
    State(state): State<AppState>,
    Json(body): Json<Permission>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .service
        .upsert_permission(&state.request_context(), &body)
        .await?;
    Ok(Json(AckResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/permissions/{perm_id}/{app_id}",
    tag = "permissions",
    params(
        ("perm_id" = String, Path, description = "Permission identifier"),
        ("app_id" = String, Path, description = "Owning application")
    ),
    responses(
        (status = 200, description = "Permission deleted (or already absent)", body = AckResponse)
    )
)]
pub(crate) async fn delete_permission(
    Path((id, app_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<AckResponse>, ApiError> {
    let key = PermissionKey { id, app_id };
    state
        .service
        .delete_permission(&state.request_context(), &key)
        .await?;
    Ok(Json(AckResponse::ok()))
}
