// src/model.rs
//! Shared view-model types: catalog items, weekly schedule buckets, weekdays.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Which upstream family an item came from. Part of an item's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Movie,
    Tv,
    Variety,
    ShortDrama,
    Anime,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Movie => "movie",
            SourceKind::Tv => "tv",
            SourceKind::Variety => "variety",
            SourceKind::ShortDrama => "short_drama",
            SourceKind::Anime => "anime",
        }
    }
}

/// Douban-style ratings arrive as strings ("8.7"), bangumi ones as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rating {
    Score(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub kind: SourceKind,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub poster: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<u32>,
    /// Plot summary; usually absent until background enrichment lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CatalogItem {
    pub fn new(kind: SourceKind, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            title: title.into(),
            poster: String::new(),
            rating: None,
            year: None,
            episodes: None,
            description: None,
        }
    }

    pub fn with_poster(mut self, poster: impl Into<String>) -> Self {
        self.poster = poster.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Weekday {
    /// Current weekday in the server's local timezone.
    pub fn today() -> Self {
        chrono::Local::now().weekday().into()
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(w: chrono::Weekday) -> Self {
        match w {
            chrono::Weekday::Sun => Weekday::Sun,
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
        }
    }
}

/// One weekday's worth of airing anime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub weekday: Weekday,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// Entries of the bucket tagged `weekday`; empty when there is no such bucket.
pub fn entries_for(schedule: &[DayBucket], weekday: Weekday) -> &[CatalogItem] {
    schedule
        .iter()
        .find(|b| b.weekday == weekday)
        .map(|b| b.items.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_serializes_as_short_english_tag() {
        let s = serde_json::to_string(&Weekday::Thu).unwrap();
        assert_eq!(s, "\"Thu\"");
        let w: Weekday = serde_json::from_str("\"Sun\"").unwrap();
        assert_eq!(w, Weekday::Sun);
    }

    #[test]
    fn rating_accepts_numbers_and_strings() {
        let r: Rating = serde_json::from_str("7.5").unwrap();
        assert_eq!(r, Rating::Score(7.5));
        let r: Rating = serde_json::from_str("\"8.1\"").unwrap();
        assert_eq!(r, Rating::Text("8.1".into()));
    }

    #[test]
    fn entries_for_missing_bucket_is_empty() {
        let schedule = vec![DayBucket {
            weekday: Weekday::Mon,
            items: vec![CatalogItem::new(SourceKind::Anime, "1", "A")],
        }];
        assert_eq!(entries_for(&schedule, Weekday::Mon).len(), 1);
        assert!(entries_for(&schedule, Weekday::Tue).is_empty());
    }

    #[test]
    fn blank_description_does_not_count() {
        let it = CatalogItem::new(SourceKind::Movie, "1", "x").with_description("   ");
        assert!(!it.has_description());
    }
}
