// tests/metrics.rs
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use home_dashboard::metrics::Metrics;
use home_dashboard::model::{CatalogItem, SourceKind};
use home_dashboard::upstream::{Feed, FixtureUpstream};
use home_dashboard::{router, AppState, DashboardConfig};

#[tokio::test]
async fn metrics_endpoint_reports_dashboard_series() {
    // Installs the global recorder; keep this the only test in the binary.
    let metrics = Metrics::init().expect("recorder installs once per process");

    let up = FixtureUpstream::new()
        .with_catalog(Feed::TvShows, vec![CatalogItem::new(SourceKind::Tv, "t1", "Show")])
        .with_detail("t1", "A plot.")
        .failing(Feed::Movies, "down");
    let mut cfg = DashboardConfig::default();
    cfg.enrich.grace_ms = 3000;
    let app = router(AppState::new(cfg, Arc::new(up))).merge(metrics.router());

    let resp = app
        .clone()
        .oneshot(Request::get("/home").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "dashboard_source_errors_total",
        "source=\"movies\"",
        "dashboard_enrich_patched_total",
        "dashboard_load_ms",
    ] {
        assert!(text.contains(needle), "missing `{needle}` in:\n{text}");
    }
}
