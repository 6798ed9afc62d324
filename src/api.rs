// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;

use crate::cache::{self, ShortDramaCache};
use crate::config::DashboardConfig;
use crate::dashboard::{Dashboard, HomeSnapshot};
use crate::preload::PreloadHead;
use crate::probe::FeatureProber;
use crate::upstream::Upstream;

pub const CONTENT_MODE_HEADER: &str = "x-content-mode";
pub const ADULT_FILTER_HEADER: &str = "x-adult-filter";

const MSG_FILTERED: &str = "Family-safe mode - adult content filtered";
const MSG_UNFILTERED: &str = "Full content mode - showing all content";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub upstream: Arc<dyn Upstream>,
    pub cache: Option<Arc<ShortDramaCache>>,
    pub prober: Option<Arc<FeatureProber>>,
    /// Fired after a dashboard has been served; the feature probe waits for it.
    pub first_paint: Arc<Notify>,
}

impl AppState {
    pub fn new(config: DashboardConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            config: Arc::new(config),
            upstream,
            cache: None,
            prober: None,
            first_paint: Arc::new(Notify::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ShortDramaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_prober(mut self, prober: Arc<FeatureProber>) -> Self {
        self.prober = Some(prober);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let dashboard = Router::new()
        .route("/home", get(home))
        .layer(CorsLayer::very_permissive());

    Router::new()
        .route("/", get(status).options(status_preflight))
        .route("/health", get(|| async { "ok" }))
        .merge(dashboard)
        .with_state(state)
}

/// Filtering is on unless the caller explicitly asks for the full catalog.
pub fn adult_filter_enabled(
    adult: Option<&str>,
    filter: Option<&str>,
    content_mode: Option<&str>,
) -> bool {
    !(matches!(adult, Some("1") | Some("true"))
        || filter == Some("off")
        || content_mode == Some("adult"))
}

/// First value of `key`; later repeats are ignored.
fn first_param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, X-Content-Mode"),
    );
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: String,
    pub authenticated: bool,
    pub adult_filter_enabled: bool,
    pub message: &'static str,
}

async fn status(
    State(state): State<AppState>,
    Query(q): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let content_mode = headers
        .get(CONTENT_MODE_HEADER)
        .and_then(|v| v.to_str().ok());
    let filtered = adult_filter_enabled(
        first_param(&q, "adult"),
        first_param(&q, "filter"),
        content_mode,
    );

    let body = StatusResponse {
        status: "ok",
        version: state.config.status.version.clone(),
        authenticated: true,
        adult_filter_enabled: filtered,
        message: if filtered { MSG_FILTERED } else { MSG_UNFILTERED },
    };

    let mut resp = Json(body).into_response();
    let h = resp.headers_mut();
    apply_cors(h);
    h.insert(
        HeaderName::from_static(ADULT_FILTER_HEADER),
        HeaderValue::from_static(if filtered { "enabled" } else { "disabled" }),
    );
    resp
}

async fn status_preflight() -> Response {
    let mut resp = StatusCode::NO_CONTENT.into_response();
    apply_cors(resp.headers_mut());
    resp
}

#[derive(Debug, Serialize)]
pub struct Features {
    pub ai_recommend: bool,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    #[serde(flatten)]
    pub snapshot: HomeSnapshot,
    pub features: Features,
}

/// One dashboard session per request: load, snapshot, tear down. Enrichment
/// that has not landed by snapshot time is dropped unless a grace period is
/// configured.
async fn home(State(state): State<AppState>) -> Response {
    if let Some(c) = &state.cache {
        cache::spawn_clean(Arc::clone(c));
    }

    let dashboard = Dashboard::new(Arc::clone(&state.upstream), &state.config);
    dashboard.load().await;
    if let Some(grace) = state.config.enrich.grace() {
        if !dashboard.settle_background(grace).await {
            tracing::debug!(target: "dashboard", "enrichment still running at snapshot time");
        }
    }
    let snapshot = dashboard.snapshot();
    dashboard.teardown();
    state.first_paint.notify_one();

    let head = PreloadHead::default();
    let hints = head.preload(snapshot.banner.iter().map(|b| b.poster.as_str()));
    let link_values: Vec<String> = hints.header_values().collect();

    let features = Features {
        ai_recommend: state.prober.as_ref().map_or(true, |p| p.enabled()),
    };
    let mut resp = Json(HomeResponse { snapshot, features }).into_response();
    for v in link_values {
        if let Ok(v) = HeaderValue::from_str(&v) {
            resp.headers_mut().append(header::LINK, v);
        }
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_decision_table() {
        assert!(adult_filter_enabled(None, None, None));
        assert!(!adult_filter_enabled(Some("1"), None, None));
        assert!(!adult_filter_enabled(Some("true"), None, None));
        assert!(adult_filter_enabled(Some("yes"), None, None));
        assert!(adult_filter_enabled(Some("TRUE"), None, None));
        assert!(!adult_filter_enabled(None, Some("off"), None));
        assert!(adult_filter_enabled(None, Some("on"), None));
        assert!(!adult_filter_enabled(None, None, Some("adult")));
        assert!(adult_filter_enabled(None, None, Some("family")));
    }

    #[test]
    fn first_param_ignores_repeats() {
        let q = vec![
            ("adult".to_string(), "1".to_string()),
            ("adult".to_string(), "0".to_string()),
        ];
        assert_eq!(first_param(&q, "adult"), Some("1"));
        assert_eq!(first_param(&q, "filter"), None);
    }
}
