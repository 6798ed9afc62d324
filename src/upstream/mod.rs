// src/upstream/mod.rs
//! Contracts for the remote collaborators the dashboard stitches together.
//!
//! Every call settles independently; callers decide what a failure means.

pub mod error;
pub mod fixture;
pub mod http;
pub mod wire;

use anyhow::Result;

use crate::model::{CatalogItem, DayBucket, SourceKind};

pub use error::UpstreamError;
pub use fixture::FixtureUpstream;
pub use http::HttpUpstream;

/// Status code the catalog API uses for a usable page.
pub const CODE_OK: i64 = 200;

/// The five independent feeds behind one dashboard load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Movies,
    TvShows,
    VarietyShows,
    ShortDramas,
    Schedule,
}

impl Feed {
    pub const ALL: [Feed; 5] = [
        Feed::Movies,
        Feed::TvShows,
        Feed::VarietyShows,
        Feed::ShortDramas,
        Feed::Schedule,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feed::Movies => "movies",
            Feed::TvShows => "tv_shows",
            Feed::VarietyShows => "variety_shows",
            Feed::ShortDramas => "short_dramas",
            Feed::Schedule => "schedule",
        }
    }
}

/// A categorized catalog query (`kind` / `category` / `type` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CategoryRequest {
    pub source: SourceKind,
    pub kind: &'static str,
    pub category: &'static str,
    pub kind_type: &'static str,
}

pub const HOT_MOVIES: CategoryRequest = CategoryRequest {
    source: SourceKind::Movie,
    kind: "movie",
    category: "热门",
    kind_type: "全部",
};

pub const HOT_TV: CategoryRequest = CategoryRequest {
    source: SourceKind::Tv,
    kind: "tv",
    category: "tv",
    kind_type: "tv",
};

pub const HOT_VARIETY: CategoryRequest = CategoryRequest {
    source: SourceKind::Variety,
    kind: "tv",
    category: "show",
    kind_type: "show",
};

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub code: i64,
    pub list: Vec<CatalogItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailReply {
    pub code: i64,
    pub plot_summary: Option<String>,
}

/// The schedule feed is only trusted when it really is a list of day buckets.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleReply {
    Days(Vec<DayBucket>),
    Unexpected(String),
}

#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    async fn categories(&self, req: &CategoryRequest) -> Result<CatalogPage>;
    async fn catalog_detail(&self, id: &str) -> Result<DetailReply>;
    async fn recommended_short_dramas(&self, count: usize) -> Result<Vec<CatalogItem>>;
    async fn short_drama_detail(&self, id: &str) -> Result<Option<String>>;
    async fn weekly_schedule(&self) -> Result<ScheduleReply>;
    async fn anime_detail(&self, id: &str) -> Result<Option<String>>;
    fn name(&self) -> &'static str;
}

/// Endpoint whose HTTP status decides whether an optional feature is offered.
#[async_trait::async_trait]
pub trait FlagEndpoint: Send + Sync {
    async fn probe(&self) -> Result<u16>;
}
