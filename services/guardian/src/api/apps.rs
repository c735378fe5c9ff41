//! Application API handlers.
//!
//! # Purpose and responsibility
//! CRUD over applications, the root of the RBAC hierarchy. Deleting an application cascades to
//! its permissions, roles and every association that references them.
use crate::api::error::ApiError;
use crate::api::types::AckResponse;
use crate::app::AppState;
use crate::model::Application;
use axum::Json;
use axum::extract::{Path, State};

#[utoipa::path(
    get,
    path = "/apps",
    tag = "apps",
    responses(
        (status = 200, description = "All applications ordered by id", body = [Application])
    )
)]
pub(crate) async fn list_apps(
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let apps = state.service.list_apps(&state.request_context()).await?;
    Ok(Json(apps))
}

#[utoipa::path(
    get,
    path = "/apps/{app_id}",
    tag = "apps",
    params(("app_id" = String, Path, description = "Application identifier")),
    responses(
        (status = 200, description = "Fetch application", body = Application),
        (status = 404, description = "Application not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_app(
    Path(app_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Application>, ApiError> {
    let app = state
        .service
        .get_app(&state.request_context(), &app_id)
        .await?;
    Ok(Json(app))
}

#[utoipa::path(
    post,
    path = "/apps",
    tag = "apps",
    request_body = Application,
    responses(
        (status = 200, description = "Application created or updated", body = AckResponse),
        (status = 400, description = "Invalid application", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn upsert_app(
    State(state): State<AppState>,
    Json(body): Json<Application>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .service
        .upsert_app(&state.request_context(), &body)
        .await?;
    Ok(Json(AckResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/apps/{app_id}",
    tag = "apps",
    params(("app_id" = String, Path, description = "Application identifier")),
    responses(
        (status = 200, description = "Application deleted (or already absent)", body = AckResponse)
    )
)]
pub(crate) async fn delete_app(
    Path(app_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .service
        .delete_app(&state.request_context(), &app_id)
        .await?;
    Ok(Json(AckResponse::ok()))
}
