//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the same
//! `{code, message, request_id}` shape, and maps [`ServiceError`] onto status codes.
//!
//! # Key invariants and assumptions
//! - `status` always agrees with `body.code`.
//! - NotFound → 404, Invalid → 400, ConstraintViolation → 409, Unavailable → 503,
//!   Internal → 500.
//!
//! # Security considerations
//! - Internal errors are logged server-side; the client only sees a generic message.
use crate::api::types::ErrorResponse;
use crate::service::ServiceError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use guardian::api::error::ApiError;
/// use guardian::api::types::ErrorResponse;
///
/// let err = ApiError {
///     status: StatusCode::NOT_FOUND,
///     body: ErrorResponse {
///         code: "not_found".to_string(),
///         message: "missing".to_string(),
///         request_id: None,
///     },
/// };
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn api_conflict(message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, "constraint_violation", message)
}

pub fn api_unavailable(message: &str) -> ApiError {
    api_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
}

/// Build a 500 and log the cause; the client sees `message` only.
pub fn api_internal(message: &str, err: &ServiceError) -> ApiError {
    tracing::error!(error = ?err, "guardian storage error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::NotFound(what) => api_not_found(&format!("{what} not found")),
            ServiceError::Invalid(message) => api_validation_error(message),
            ServiceError::ConstraintViolation(message) => api_conflict(message),
            ServiceError::Unavailable(message) => api_unavailable(message),
            ServiceError::Internal(_) => api_internal("internal error", &err),
        }
    }
}
