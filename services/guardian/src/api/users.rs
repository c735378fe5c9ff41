//! User API handlers.
//!
//! # Purpose and responsibility
//! CRUD over users. Reads return the full `user → roles → permissions` tree; writes replace the
//! user's role set and refresh `updated_at`.
use crate::api::error::ApiError;
use crate::api::types::AckResponse;
use crate::app::AppState;
use crate::model::User;
use axum::Json;
use axum::extract::{Path, State};

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "Users, most recently updated first", body = [User])
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.service.list_users(&state.request_context()).await?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "User name")),
    responses(
        (status = 200, description = "Fetch user with roles and permissions", body = User),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_user(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .service
        .get_user(&state.request_context(), &username)
        .await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = User,
    responses(
        (status = 200, description = "User created or updated", body = AckResponse),
        (status = 400, description = "Invalid user", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Referenced role missing", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn upsert_user(
    State(state): State<AppState>,
    Json(body): Json<User>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .service
        .upsert_user(&state.request_context(), &body)
        .await?;
    Ok(Json(AckResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "User name")),
    responses(
        (status = 200, description = "User deleted (or already absent)", body = AckResponse)
    )
)]
pub(crate) async fn delete_user(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .service
        .delete_user(&state.request_context(), &username)
        .await?;
    Ok(Json(AckResponse::ok()))
}
