// End-to-end coverage of the demo server's outer FaaS boundary: the full
// axum router (controllers + panic-recovery middleware) driven through
// `tower::ServiceExt::oneshot`, against an in-process mock upstream.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::controller::{Controller, HealthController, PrometheusMetricsController, ProxyController};
use crate::engine::ProxyEngine;
use crate::middleware::{Middleware, PanicRecoverMiddleware};
use crate::model::{Request, Response};
use crate::storage::memory::MemoryStorage;

async fn spawn_upstream(body: &'static [u8], content_type: &'static str) -> String {
    let router = Router::new().route("/", get(move || async move { ([("content-type", content_type)], body) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/")
}

fn build_router(engine: Arc<ProxyEngine>) -> Router {
    let mut router = Router::new();
    router = HealthController::new().add_route(router);
    router = PrometheusMetricsController::new().add_route(router);
    router = ProxyController::new(engine, CancellationToken::new()).add_route(router);
    PanicRecoverMiddleware::new().apply(router)
}

async fn post_json(router: &Router, body: &Request) -> (StatusCode, serde_json::Value) {
    let req = HttpRequest::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let storage = Arc::new(MemoryStorage::default());
    let engine = Arc::new(ProxyEngine::new(storage, "burrow-1", "us-east-1"));
    let router = build_router(engine);

    let req = HttpRequest::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let storage = Arc::new(MemoryStorage::default());
    let engine = Arc::new(ProxyEngine::new(storage, "burrow-1", "us-east-1"));
    let router = build_router(engine);

    let req = HttpRequest::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("burrow_requests_total"));
}

#[tokio::test]
async fn successful_proxy_call_is_wrapped_in_outer_200() {
    let url = spawn_upstream(b"hello world", "text/plain").await;
    let storage = Arc::new(MemoryStorage::default());
    let engine = Arc::new(ProxyEngine::new(storage, "burrow-1", "us-east-1"));
    let router = build_router(engine);

    let mut req = Request::new(url);
    req.cache_max_age = 30.0;
    let (status, body) = post_json(&router, &req).await;

    assert_eq!(status, StatusCode::OK);
    let resp: Response = serde_json::from_value(body).unwrap();
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.decode_body().unwrap(), b"hello world");
}

#[tokio::test]
async fn bad_request_maps_to_outer_400_with_typed_body() {
    let storage = Arc::new(MemoryStorage::default());
    let engine = Arc::new(ProxyEngine::new(storage, "burrow-1", "us-east-1"));
    let router = build_router(engine);

    let req = Request::new("not a url");
    let (status, body) = post_json(&router, &req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], 1);
}

#[tokio::test]
async fn disallowed_content_type_maps_to_outer_500_with_typed_body() {
    let url = spawn_upstream(b"<html></html>", "text/html").await;
    let storage = Arc::new(MemoryStorage::default());
    let engine = Arc::new(ProxyEngine::new(storage, "burrow-1", "us-east-1"));
    let router = build_router(engine);

    let mut req = Request::new(url);
    req.allowed_content_types = vec!["application/json".to_string()];
    let (status, body) = post_json(&router, &req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["type"], 3);
}

#[tokio::test]
async fn cache_hit_round_trip_through_the_full_router() {
    let url = spawn_upstream(b"cached payload", "application/json").await;
    let storage = Arc::new(MemoryStorage::default());
    let engine = Arc::new(ProxyEngine::new(storage, "burrow-1", "us-east-1"));
    let router = build_router(engine);

    let mut req = Request::new(url);
    req.cache_max_age = 60.0;

    let (first_status, first_body) = post_json(&router, &req).await;
    assert_eq!(first_status, StatusCode::OK);
    let first: Response = serde_json::from_value(first_body).unwrap();

    let (second_status, second_body) = post_json(&router, &req).await;
    assert_eq!(second_status, StatusCode::OK);
    let second: Response = serde_json::from_value(second_body).unwrap();

    assert_eq!(first.decode_body().unwrap(), second.decode_body().unwrap());
}
