//! HTTP API request/response types.
//!
//! # Purpose
//! Shared payload shapes for the REST API and OpenAPI schema generation. Entities are served
//! as their model types directly; only acknowledgments and errors need envelopes.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `{"message": ...}` body returned by writes, deletes and the health probe.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct AckResponse {
    pub message: String,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self {
            message: "ok".to_string(),
        }
    }

    pub fn healthy() -> Self {
        Self {
            message: "It's healthy".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}
