// tests/api_status.rs
//
// Status endpoint, exercised through the router via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET / with the three filter opt-outs (adult, filter, X-Content-Mode)
// - OPTIONS / preflight
// - CORS and X-Adult-Filter headers

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _;

use home_dashboard::upstream::FixtureUpstream;
use home_dashboard::{router, AppState, DashboardConfig};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let mut cfg = DashboardConfig::default();
    cfg.status.version = "9.9.9".to_string();
    router(AppState::new(cfg, Arc::new(FixtureUpstream::new())))
}

async fn get_status(req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Json) {
    let resp = test_router().oneshot(req).await.expect("oneshot /");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json: Json = serde_json::from_slice(&bytes).expect("json body");
    (status, headers, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

#[tokio::test]
async fn health_returns_ok() {
    let resp = test_router().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn default_request_is_filtered() {
    let (status, headers, json) = get_status(get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], "9.9.9");
    assert_eq!(json["authenticated"], true);
    assert_eq!(json["adultFilterEnabled"], true);
    assert_eq!(json["message"], "Family-safe mode - adult content filtered");
    assert_eq!(headers["x-adult-filter"], "enabled");
    assert_eq!(headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn adult_query_disables_filter() {
    for uri in ["/?adult=1", "/?adult=true"] {
        let (_, headers, json) = get_status(get(uri)).await;
        assert_eq!(json["adultFilterEnabled"], false, "{uri}");
        assert_eq!(json["message"], "Full content mode - showing all content");
        assert_eq!(headers["x-adult-filter"], "disabled");
    }
}

#[tokio::test]
async fn unrecognised_adult_value_keeps_filter() {
    let (_, _, json) = get_status(get("/?adult=yes")).await;
    assert_eq!(json["adultFilterEnabled"], true);
}

#[tokio::test]
async fn filter_off_disables_filter() {
    let (_, headers, json) = get_status(get("/?filter=off")).await;
    assert_eq!(json["adultFilterEnabled"], false);
    assert_eq!(headers["x-adult-filter"], "disabled");
}

#[tokio::test]
async fn content_mode_header_disables_filter() {
    let req = Request::builder()
        .method("GET")
        .uri("/")
        .header("X-Content-Mode", "adult")
        .body(Body::empty())
        .unwrap();
    let (_, _, json) = get_status(req).await;
    assert_eq!(json["adultFilterEnabled"], false);
}

#[tokio::test]
async fn preflight_is_no_content_with_cors_headers() {
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let h = resp.headers();
    assert_eq!(h["access-control-allow-origin"], "*");
    assert_eq!(h["access-control-allow-methods"], "GET, OPTIONS");
    assert_eq!(h["access-control-allow-headers"], "Content-Type, X-Content-Mode");
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn repeated_query_keys_use_the_first_value() {
    for uri in ["/?adult=1&adult=0", "/?filter=off&filter=on"] {
        let (_, headers, json) = get_status(get(uri)).await;
        assert_eq!(json["adultFilterEnabled"], false, "{uri}");
        assert_eq!(headers["x-adult-filter"], "disabled", "{uri}");
    }
    let (_, _, json) = get_status(get("/?adult=0&adult=1")).await;
    assert_eq!(json["adultFilterEnabled"], true);
}
