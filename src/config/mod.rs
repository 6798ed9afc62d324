// src/config/mod.rs
pub mod dashboard;

pub use dashboard::{
    DashboardConfig, EnrichConfig, ProbeConfig, ShortDramaConfig, StatusConfig, UpstreamConfig,
    UpstreamMode, DEFAULT_CONFIG_PATH, ENV_APP_VERSION, ENV_CONFIG_PATH,
};
