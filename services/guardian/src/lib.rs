//! Guardian: RBAC authorization-data service.
//!
//! # Purpose
//! Stores applications, their permissions and roles, and users holding roles, and serves them
//! over HTTP as nested read views. The binary in `main.rs` only loads configuration and calls
//! [`run_with_shutdown`].
//!
//! # Notes
//! Module boundaries follow the request path: `api` → `service` → `store` → `model`.
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod observability;
pub mod service;
pub mod store;

use anyhow::Context;
use app::{AppState, build_router};
use config::{GuardianConfig, StorageBackend};
use service::AccessService;
use std::future::Future;
use std::sync::Arc;
use store::AccessStore;
use store::memory::InMemoryStore;
use store::postgres::PostgresStore;

/// Open the configured backend and wrap it in the facade.
pub async fn build_state(config: &GuardianConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn AccessStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => Arc::new(
            PostgresStore::connect(&config.database, &config.pool)
                .await
                .context("connect postgres store")?,
        ),
    };
    tracing::info!(
        backend = store.backend_name(),
        durable = store.is_durable(),
        "storage backend ready"
    );
    Ok(AppState::new(
        AccessService::new(store),
        config.request_timeout(),
    ))
}

/// Serve the API and metrics endpoints until `shutdown` resolves.
///
/// When `shutdown` fires, in-flight requests are cancelled through the state's shutdown token
/// and both listeners drain.
pub async fn run_with_shutdown<F>(config: GuardianConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("guardian")?;
    let state = build_state(&config).await?;
    let token = state.shutdown.clone();

    let metrics_token = token.clone();
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
        async move { metrics_token.cancelled().await },
    ));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "guardian listening");

    let serve_token = token.clone();
    let result = axum::serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutdown requested");
            serve_token.cancel();
        })
        .await;

    token.cancel();
    if let Ok(Err(err)) = metrics_task.await {
        tracing::warn!(error = %err, "metrics listener failed");
    }
    result.context("serve http")
}
