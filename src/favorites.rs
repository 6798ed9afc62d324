// src/favorites.rs
//! Favorites / continue-watching view: joins persisted favorites with play
//! progress and keeps the list current from store change notifications.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;

/// Separator of the persisted `source+id` string key.
pub const KEY_SEPARATOR: char = '+';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("source {0:?} contains the key separator and cannot be stored")]
    AmbiguousSource(String),
}

/// Structured favorites key. Persisted data still uses the `source+id` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FavoriteKey {
    pub source: String,
    pub id: String,
}

impl FavoriteKey {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }

    /// Split a stored key on the first separator. A key without one is all id.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(KEY_SEPARATOR) {
            Some((source, id)) => Self::new(source, id),
            None => Self::new("", raw),
        }
    }

    /// Stored form. Ids may contain the separator; sources may not, or the
    /// key would read back differently.
    pub fn encode(&self) -> Result<String, KeyError> {
        if self.source.contains(KEY_SEPARATOR) {
            return Err(KeyError::AmbiguousSource(self.source.clone()));
        }
        Ok(format!("{}{}{}", self.source, KEY_SEPARATOR, self.id))
    }
}

impl fmt::Display for FavoriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.source, KEY_SEPARATOR, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vod,
    Live,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub title: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub total_episodes: u32,
    /// Milliseconds since the epoch.
    pub save_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_name: String,
    /// Last watched episode (1-based).
    pub index: u32,
    #[serde(default)]
    pub total_episodes: u32,
    #[serde(default)]
    pub play_time: u64,
    #[serde(default)]
    pub total_time: u64,
    #[serde(default)]
    pub save_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteViewItem {
    pub id: String,
    pub source: String,
    pub title: String,
    pub year: String,
    pub poster: String,
    pub episodes: u32,
    pub source_name: String,
    #[serde(rename = "currentEpisode", skip_serializing_if = "Option::is_none")]
    pub current_episode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

/// Join favorites with play progress, newest save first.
///
/// Equal save times fall back to key order so the output is deterministic.
pub fn build_favorite_items(
    favorites: &HashMap<String, FavoriteRecord>,
    play_records: &HashMap<String, PlayRecord>,
) -> Vec<FavoriteViewItem> {
    let mut entries: Vec<(&String, &FavoriteRecord)> = favorites.iter().collect();
    entries.sort_by(|(ka, a), (kb, b)| b.save_time.cmp(&a.save_time).then_with(|| ka.cmp(kb)));

    entries
        .into_iter()
        .map(|(raw_key, fav)| {
            let key = FavoriteKey::parse(raw_key);
            FavoriteViewItem {
                id: key.id,
                source: key.source,
                title: fav.title.clone(),
                year: fav.year.clone(),
                poster: fav.cover.clone(),
                episodes: fav.total_episodes,
                source_name: fav.source_name.clone(),
                current_episode: play_records.get(raw_key).map(|p| p.index),
                search_title: fav.search_title.clone(),
                origin: fav.origin,
            }
        })
        .collect()
}

/// Typed change notifications published by the stores.
#[derive(Debug, Clone)]
pub enum DataUpdate {
    FavoritesUpdated(HashMap<String, FavoriteRecord>),
    PlayRecordsUpdated(HashMap<String, PlayRecord>),
}

#[async_trait]
pub trait FavoritesStore: Send + Sync {
    async fn all_favorites(&self) -> Result<HashMap<String, FavoriteRecord>>;
    async fn clear_all_favorites(&self) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<DataUpdate>;
}

#[async_trait]
pub trait PlayRecordStore: Send + Sync {
    async fn all_play_records(&self) -> Result<HashMap<String, PlayRecord>>;
}

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// In-process store; every mutation publishes the full updated mapping.
pub struct MemoryStore {
    favorites: RwLock<HashMap<String, FavoriteRecord>>,
    play_records: RwLock<HashMap<String, PlayRecord>>,
    updates: broadcast::Sender<DataUpdate>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            favorites: RwLock::new(HashMap::new()),
            play_records: RwLock::new(HashMap::new()),
            updates,
        }
    }

    /// Seed from already-persisted string-keyed data without notifying.
    pub fn with_data(
        favorites: HashMap<String, FavoriteRecord>,
        play_records: HashMap<String, PlayRecord>,
    ) -> Self {
        let me = Self::new();
        Self {
            favorites: RwLock::new(favorites),
            play_records: RwLock::new(play_records),
            ..me
        }
    }

    pub async fn save_favorite(&self, key: &FavoriteKey, record: FavoriteRecord) -> Result<()> {
        let raw = key.encode()?;
        let snapshot = {
            let mut g = self.favorites.write().await;
            g.insert(raw, record);
            g.clone()
        };
        self.publish(DataUpdate::FavoritesUpdated(snapshot));
        Ok(())
    }

    pub async fn delete_favorite(&self, key: &FavoriteKey) -> Result<()> {
        let raw = key.encode()?;
        let snapshot = {
            let mut g = self.favorites.write().await;
            g.remove(&raw);
            g.clone()
        };
        self.publish(DataUpdate::FavoritesUpdated(snapshot));
        Ok(())
    }

    pub async fn save_play_record(&self, key: &FavoriteKey, record: PlayRecord) -> Result<()> {
        let raw = key.encode()?;
        let snapshot = {
            let mut g = self.play_records.write().await;
            g.insert(raw, record);
            g.clone()
        };
        self.publish(DataUpdate::PlayRecordsUpdated(snapshot));
        Ok(())
    }

    fn publish(&self, update: DataUpdate) {
        // No subscribers is fine: nobody is looking at the view.
        let _ = self.updates.send(update);
    }

    pub fn subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }
}

#[async_trait]
impl FavoritesStore for MemoryStore {
    async fn all_favorites(&self) -> Result<HashMap<String, FavoriteRecord>> {
        Ok(self.favorites.read().await.clone())
    }

    async fn clear_all_favorites(&self) -> Result<()> {
        self.favorites.write().await.clear();
        self.publish(DataUpdate::FavoritesUpdated(HashMap::new()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DataUpdate> {
        self.updates.subscribe()
    }
}

#[async_trait]
impl PlayRecordStore for MemoryStore {
    async fn all_play_records(&self) -> Result<HashMap<String, PlayRecord>> {
        Ok(self.play_records.read().await.clone())
    }
}

async fn rebuild(
    plays: &dyn PlayRecordStore,
    favorites: &HashMap<String, FavoriteRecord>,
    out: &watch::Sender<Vec<FavoriteViewItem>>,
) {
    let play_records = match plays.all_play_records().await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(target: "favorites", error = ?e, "play records unavailable; listing without progress");
            HashMap::new()
        }
    };
    out.send_replace(build_favorite_items(favorites, &play_records));
}

/// The favorites tab. Subscribed to store updates only while active.
pub struct FavoritesView {
    favorites: Arc<dyn FavoritesStore>,
    plays: Arc<dyn PlayRecordStore>,
    items: Arc<watch::Sender<Vec<FavoriteViewItem>>>,
    listener: Option<JoinHandle<()>>,
}

impl FavoritesView {
    pub fn new(favorites: Arc<dyn FavoritesStore>, plays: Arc<dyn PlayRecordStore>) -> Self {
        Self {
            favorites,
            plays,
            items: Arc::new(watch::Sender::new(Vec::new())),
            listener: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    /// Load once and start following change notifications. Re-activating an
    /// active view is a no-op.
    pub async fn activate(&mut self) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }
        // Subscribe before reading so no update slips between the two.
        let mut rx = self.favorites.subscribe();
        let all = self.favorites.all_favorites().await?;
        rebuild(self.plays.as_ref(), &all, &self.items).await;

        let plays = Arc::clone(&self.plays);
        let items = Arc::clone(&self.items);
        self.listener = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(DataUpdate::FavoritesUpdated(map)) => {
                        rebuild(plays.as_ref(), &map, &items).await
                    }
                    Ok(DataUpdate::PlayRecordsUpdated(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(target: "favorites", skipped = n, "favorites listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
        Ok(())
    }

    /// Stop following notifications. The current list is kept.
    pub fn deactivate(&mut self) {
        if let Some(h) = self.listener.take() {
            h.abort();
        }
    }

    pub fn items(&self) -> Vec<FavoriteViewItem> {
        self.items.borrow().clone()
    }

    pub fn subscribe_items(&self) -> watch::Receiver<Vec<FavoriteViewItem>> {
        self.items.subscribe()
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.favorites.clear_all_favorites().await?;
        self.items.send_replace(Vec::new());
        Ok(())
    }
}

impl Drop for FavoritesView {
    fn drop(&mut self) {
        self.deactivate();
    }
}
