//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared application state
//! injected into handlers.
//!
//! # Notes
//! Every request gets its own [`RequestContext`]: the configured timeout as its deadline and a
//! child of the shutdown token for cancellation.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::observability;
use crate::service::{AccessService, RequestContext};
use axum::Router;
use axum::routing::get;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub service: AccessService,
    pub request_timeout: Duration,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: AccessService, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
            .with_cancellation(self.shutdown.child_token())
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/health", get(api::system::health))
        .route(
            "/apps",
            get(api::apps::list_apps).post(api::apps::upsert_app),
        )
        .route(
            "/apps/:app_id",
            get(api::apps::get_app).delete(api::apps::delete_app),
        )
        .route(
            "/permissions",
            get(api::permissions::list_permissions).post(api::permissions::upsert_permission),
        )
        .route(
            "/permissions/:perm_id/:app_id",
            get(api::permissions::get_permission).delete(api::permissions::delete_permission),
        )
        .route(
            "/roles",
            get(api::roles::list_roles).post(api::roles::upsert_role),
        )
        .route(
            "/roles/:role_id/:app_id",
            get(api::roles::get_role).delete(api::roles::delete_role),
        )
        .route(
            "/users",
            get(api::users::list_users).post(api::users::upsert_user),
        )
        .route(
            "/users/:username",
            get(api::users::get_user).delete(api::users::delete_user),
        )
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(trace_layer)
        .with_state(state)
}
