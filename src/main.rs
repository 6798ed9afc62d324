//! Home Dashboard Service - Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and metrics.

use home_dashboard::{build_state, metrics::Metrics, router, DashboardConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs. `try_init` leaves a host-installed subscriber alone.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("home_dashboard=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = DashboardConfig::load_default()?;
    let state = build_state(config)?;

    let mut app = router(state);
    match Metrics::init() {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(app.into())
}
