//! Health Check API Tests

use std::sync::Arc;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use rental_chat::infrastructure::memory::MemoryBroker;
use rental_chat::startup::InMemoryBackends;

use crate::common::{body_json, TestApp};

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn test_readiness_reports_each_dependency() {
    let app = TestApp::new().await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"]["message"], "in-memory storage");
    assert_eq!(json["checks"]["realtime"]["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_degraded_without_realtime_transport() {
    let backends = InMemoryBackends {
        broker: Arc::new(MemoryBroker::unreachable()),
        ..Default::default()
    };
    let app = TestApp::with_backends(backends).await;

    let response = app.get("/health/ready").await;

    // Chat keeps serving history and sends without live push
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["realtime"]["status"], "degraded");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_http_counters() {
    let app = TestApp::new().await;
    app.get("/health").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("rental_chat_http_requests_total"));
}
