// src/config/dashboard.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";
pub const ENV_APP_VERSION: &str = "APP_VERSION";
pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub upstream: UpstreamConfig,
    pub enrich: EnrichConfig,
    pub short_drama: ShortDramaConfig,
    pub probe: ProbeConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    Http,
    Fixture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub mode: UpstreamMode,
    /// Base URL of the app backend serving `/api/douban/*` and `/api/shortdrama/*`.
    pub api_base: String,
    pub bangumi_base: String,
    pub fixture_path: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mode: UpstreamMode::Http,
            api_base: "http://127.0.0.1:3000".to_string(),
            bangumi_base: "https://api.bgm.tv".to_string(),
            fixture_path: "fixtures/home.json".to_string(),
            connect_timeout_secs: 4,
            timeout_secs: 10,
            user_agent: concat!("home-dashboard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// How many leading items of each slice get a background detail fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub movies: usize,
    pub tv_shows: usize,
    pub variety_shows: usize,
    pub short_dramas: usize,
    /// Optional wait for enrichment before `/home` snapshots. Zero (the
    /// default) snapshots as soon as every feed has settled.
    pub grace_ms: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            movies: 2,
            tv_shows: 2,
            variety_shows: 1,
            short_dramas: 2,
            grace_ms: 0,
        }
    }
}

impl EnrichConfig {
    /// `None` when `/home` should not wait for enrichment at all.
    pub fn grace(&self) -> Option<Duration> {
        (self.grace_ms > 0).then(|| Duration::from_millis(self.grace_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortDramaConfig {
    pub recommend_count: usize,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
}

impl Default for ShortDramaConfig {
    fn default() -> Self {
        Self {
            recommend_count: 8,
            cache_dir: PathBuf::from("cache/shortdrama"),
            cache_ttl_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,
    pub path: String,
    /// Upper bound on waiting for the idle hook.
    pub idle_timeout_ms: u64,
    /// Fixed delay used when no idle hook is wired.
    pub fallback_delay_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/api/ai-recommend".to_string(),
            idle_timeout_ms: 1500,
            fallback_delay_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub version: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load from an explicit TOML file. Missing sections fall back to defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        let mut cfg = Self::parse(&data)
            .with_context(|| format!("parsing dashboard config {}", path.display()))?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $DASHBOARD_CONFIG_PATH (must exist)
    /// 2) config/dashboard.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        Ok(cfg)
    }

    fn parse(s: &str) -> Result<Self> {
        let mut cfg: DashboardConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_APP_VERSION) {
            let v = v.trim();
            if !v.is_empty() {
                self.status.version = v.to_string();
            }
        }
    }

    fn sanitize(&mut self) {
        self.upstream.api_base = self.upstream.api_base.trim_end_matches('/').to_string();
        self.upstream.bangumi_base = self.upstream.bangumi_base.trim_end_matches('/').to_string();
        if self.short_drama.recommend_count == 0 {
            self.short_drama.recommend_count = ShortDramaConfig::default().recommend_count;
        }
        if self.upstream.timeout_secs == 0 {
            self.upstream.timeout_secs = UpstreamConfig::default().timeout_secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = DashboardConfig::parse("").unwrap();
        assert_eq!(cfg.enrich.movies, 2);
        assert_eq!(cfg.enrich.variety_shows, 1);
        assert_eq!(cfg.short_drama.recommend_count, 8);
        assert_eq!(cfg.upstream.mode, UpstreamMode::Http);
        assert_eq!(cfg.status.version, "1.0.0");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = DashboardConfig::parse(
            r#"
            [upstream]
            api_base = "http://backend:3000/"
            mode = "fixture"

            [enrich]
            movies = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.upstream.api_base, "http://backend:3000");
        assert_eq!(cfg.upstream.mode, UpstreamMode::Fixture);
        assert_eq!(cfg.enrich.movies, 3);
        assert_eq!(cfg.enrich.tv_shows, 2);
        assert_eq!(cfg.upstream.bangumi_base, "https://api.bgm.tv");
    }

    #[test]
    fn zero_recommend_count_is_reset() {
        let cfg = DashboardConfig::parse("[short_drama]\nrecommend_count = 0\n").unwrap();
        assert_eq!(cfg.short_drama.recommend_count, 8);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(DashboardConfig::parse("[enrich\nmovies = ").is_err());
    }
}
