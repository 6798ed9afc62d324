// src/metrics.rs
use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the dashboard series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!(
            "dashboard_source_errors_total",
            "Feeds that failed or answered with an unusable payload."
        );
        describe_counter!(
            "dashboard_enrich_patched_total",
            "Descriptions patched into a published slice."
        );
        describe_counter!(
            "dashboard_enrich_failed_total",
            "Detail fetches that failed."
        );
        describe_counter!(
            "cache_janitor_removed_total",
            "Expired or corrupt short-drama cache entries removed."
        );
        describe_counter!("feature_probe_total", "Feature probes completed.");
        describe_histogram!("dashboard_load_ms", "Time until every feed settled, in ms.");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
