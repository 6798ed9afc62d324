// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod favorites;
pub mod metrics;
pub mod model;
pub mod preload;
pub mod probe;
pub mod upstream;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

pub use crate::api::{router, AppState};
pub use crate::config::DashboardConfig;

use crate::cache::ShortDramaCache;
use crate::config::UpstreamMode;
use crate::probe::{Deferral, FeatureProber};
use crate::upstream::{FixtureUpstream, FlagEndpoint, HttpUpstream, Upstream};

/// Wire cache, upstream and feature probe from config.
///
/// Must run inside a Tokio runtime: the feature probe is scheduled here and
/// waits for the first served dashboard (or its idle timeout) before firing.
pub fn build_state(config: DashboardConfig) -> anyhow::Result<AppState> {
    let cache = Arc::new(ShortDramaCache::new(config.short_drama.cache_dir.clone()));

    let (upstream, endpoint): (Arc<dyn Upstream>, Arc<dyn FlagEndpoint>) =
        match config.upstream.mode {
            UpstreamMode::Http => {
                let http = Arc::new(
                    HttpUpstream::from_config(&config, Some(Arc::clone(&cache)))
                        .context("building upstream http client")?,
                );
                let upstream: Arc<dyn Upstream> = http.clone();
                let endpoint: Arc<dyn FlagEndpoint> = http;
                (upstream, endpoint)
            }
            UpstreamMode::Fixture => {
                let fx = Arc::new(FixtureUpstream::from_path(&config.upstream.fixture_path)?);
                let upstream: Arc<dyn Upstream> = fx.clone();
                let endpoint: Arc<dyn FlagEndpoint> = fx;
                (upstream, endpoint)
            }
        };
    info!(
        mode = ?config.upstream.mode,
        upstream = upstream.name(),
        "dashboard upstream ready"
    );

    let probe_enabled = config.probe.enabled;
    let mut state = AppState::new(config, upstream).with_cache(cache);

    if probe_enabled {
        let deferral = Deferral::from_config(&state.config.probe, Some(Arc::clone(&state.first_paint)));
        let prober = Arc::new(FeatureProber::new(endpoint, deferral));
        prober.schedule();
        state = state.with_prober(prober);
    }
    Ok(state)
}
