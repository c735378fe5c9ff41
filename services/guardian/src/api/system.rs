//! Health endpoint.
//!
//! # Key invariants and assumptions
//! - The probe is bounded by the facade's fixed health timeout.
//! - Any failure is reported as 503 so load balancers take the instance out of rotation.
use crate::api::error::{ApiError, api_unavailable};
use crate::api::types::AckResponse;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Backend reachable", body = AckResponse),
        (status = 503, description = "Backend unreachable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn health(State(state): State<AppState>) -> Result<Json<AckResponse>, ApiError> {
    match state.service.health(&state.request_context()).await {
        Ok(()) => Ok(Json(AckResponse::healthy())),
        Err(err) => {
            tracing::warn!(
                error = %err,
                backend = state.service.backend_name(),
                "health check failed"
            );
            Err(api_unavailable("storage unavailable"))
        }
    }
}
