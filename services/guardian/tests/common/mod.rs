#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use guardian::app::{AppState, build_router};
use guardian::service::AccessService;
use guardian::store::AccessStore;
use guardian::store::memory::InMemoryStore;
use std::sync::Arc;
use std::time::Duration;

pub type TestApp = axum::routing::RouterIntoService<Body, ()>;

pub fn app_with_store(store: Arc<dyn AccessStore>) -> TestApp {
    let state = AppState::new(AccessService::new(store), Duration::from_secs(5));
    build_router(state).into_service()
}

pub fn memory_app() -> TestApp {
    app_with_store(Arc::new(InMemoryStore::new()))
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
