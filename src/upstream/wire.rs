// src/upstream/wire.rs
//! Raw response shapes of the upstream APIs and their mapping onto `CatalogItem`.

use serde::Deserialize;
use serde_json::Value;

use crate::model::{CatalogItem, DayBucket, Rating, SourceKind, Weekday};

/// Ids arrive as numbers from some APIs and strings from others.
pub fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

// ---------------- douban-style catalog ----------------

#[derive(Debug, Deserialize)]
pub struct DoubanItem {
    pub id: Value,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster: String,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub plot_summary: Option<String>,
}

impl DoubanItem {
    pub fn into_item(self, kind: SourceKind) -> CatalogItem {
        CatalogItem {
            kind,
            id: id_string(&self.id),
            title: self.title,
            poster: self.poster,
            rating: non_empty(self.rate).map(Rating::Text),
            year: non_empty(self.year),
            episodes: None,
            description: non_empty(self.plot_summary),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DoubanResult {
    pub code: i64,
    #[serde(default)]
    pub list: Vec<DoubanItem>,
}

#[derive(Debug, Deserialize)]
pub struct DoubanDetailData {
    #[serde(default)]
    pub plot_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DoubanDetailResult {
    pub code: i64,
    #[serde(default)]
    pub data: Option<DoubanDetailData>,
}

// ---------------- short dramas ----------------

#[derive(Debug, Deserialize)]
pub struct ShortDramaItem {
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub episode_count: Option<u32>,
    #[serde(default)]
    pub update_time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ShortDramaItem {
    pub fn into_item(self) -> CatalogItem {
        CatalogItem {
            kind: SourceKind::ShortDrama,
            id: id_string(&self.id),
            title: self.name,
            poster: self.cover,
            rating: self.score.map(Rating::Score),
            year: self
                .update_time
                .as_deref()
                .and_then(|t| t.get(..4))
                .map(str::to_string),
            episodes: self.episode_count,
            description: non_empty(self.description),
        }
    }
}

/// The recommend endpoint has shipped both a bare array and a `{ data: [...] }` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShortDramaList {
    Bare(Vec<ShortDramaItem>),
    Wrapped {
        #[serde(alias = "list")]
        data: Vec<ShortDramaItem>,
    },
}

impl ShortDramaList {
    pub fn into_items(self) -> Vec<CatalogItem> {
        let raw = match self {
            ShortDramaList::Bare(v) => v,
            ShortDramaList::Wrapped { data } => data,
        };
        raw.into_iter().map(ShortDramaItem::into_item).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ShortDramaDetail {
    #[serde(default)]
    pub desc: Option<String>,
}

// ---------------- bangumi ----------------

#[derive(Debug, Deserialize)]
pub struct BangumiWeekday {
    pub en: Weekday,
}

#[derive(Debug, Default, Deserialize)]
pub struct BangumiImages {
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub common: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BangumiRating {
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BangumiItem {
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_cn: String,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub images: Option<BangumiImages>,
    #[serde(default)]
    pub rating: Option<BangumiRating>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl BangumiItem {
    pub fn into_item(self) -> CatalogItem {
        let title = if self.name_cn.trim().is_empty() {
            self.name
        } else {
            self.name_cn
        };
        let images = self.images.unwrap_or_default();
        CatalogItem {
            kind: SourceKind::Anime,
            id: id_string(&self.id),
            title,
            poster: images.large.or(images.common).unwrap_or_default(),
            rating: self.rating.and_then(|r| r.score).map(Rating::Score),
            year: self
                .air_date
                .as_deref()
                .and_then(|d| d.get(..4))
                .map(str::to_string),
            episodes: None,
            description: non_empty(self.summary),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BangumiDay {
    pub weekday: BangumiWeekday,
    #[serde(default)]
    pub items: Vec<BangumiItem>,
}

impl BangumiDay {
    pub fn into_bucket(self) -> DayBucket {
        DayBucket {
            weekday: self.weekday.en,
            items: self.items.into_iter().map(BangumiItem::into_item).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BangumiSubject {
    #[serde(default)]
    pub summary: Option<String>,
}
