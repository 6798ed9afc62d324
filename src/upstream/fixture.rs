// src/upstream/fixture.rs
//! Scripted upstream for offline runs and tests.
//!
//! Each feed can succeed, fail, or wait on a gate before answering; detail and
//! probe calls are counted so callers can assert what was (not) requested.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Notify;

use super::error::UpstreamError;
use super::{
    CatalogPage, CategoryRequest, DetailReply, Feed, FlagEndpoint, ScheduleReply, Upstream, CODE_OK,
};
use crate::model::{CatalogItem, DayBucket, SourceKind};

#[derive(Debug, Clone)]
enum Scripted<T> {
    Ok(T),
    Fail(String),
}

impl<T: Clone> Scripted<T> {
    fn get(&self) -> Result<T> {
        match self {
            Scripted::Ok(v) => Ok(v.clone()),
            Scripted::Fail(msg) => Err(UpstreamError::Scripted(msg.clone()).into()),
        }
    }
}

/// On-disk shape for `upstream.mode = "fixture"`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FixtureFile {
    pub movies: Vec<CatalogItem>,
    pub tv_shows: Vec<CatalogItem>,
    pub variety_shows: Vec<CatalogItem>,
    pub short_dramas: Vec<CatalogItem>,
    pub schedule: Vec<DayBucket>,
    /// id -> plot summary, served by every detail endpoint.
    pub details: HashMap<String, String>,
}

pub struct FixtureUpstream {
    catalog: HashMap<Feed, Scripted<CatalogPage>>,
    short_dramas: Scripted<Vec<CatalogItem>>,
    schedule: Scripted<ScheduleReply>,
    details: HashMap<String, Scripted<Option<String>>>,
    gates: HashMap<Feed, Arc<Notify>>,
    detail_gate: Option<Arc<Notify>>,
    detail_calls: Mutex<Vec<String>>,
    probe_status: Scripted<u16>,
    probe_gate: Option<Arc<Notify>>,
    probe_calls: AtomicUsize,
}

impl Default for FixtureUpstream {
    fn default() -> Self {
        Self::new()
    }
}

fn catalog_feed(source: SourceKind) -> Feed {
    match source {
        SourceKind::Tv => Feed::TvShows,
        SourceKind::Variety => Feed::VarietyShows,
        _ => Feed::Movies,
    }
}

impl FixtureUpstream {
    /// Every feed succeeds with an empty list; probe answers 200.
    pub fn new() -> Self {
        let empty = || Scripted::Ok(CatalogPage {
            code: CODE_OK,
            list: Vec::new(),
        });
        let catalog = [Feed::Movies, Feed::TvShows, Feed::VarietyShows]
            .into_iter()
            .map(|f| (f, empty()))
            .collect();
        Self {
            catalog,
            short_dramas: Scripted::Ok(Vec::new()),
            schedule: Scripted::Ok(ScheduleReply::Days(Vec::new())),
            details: HashMap::new(),
            gates: HashMap::new(),
            detail_gate: None,
            detail_calls: Mutex::new(Vec::new()),
            probe_status: Scripted::Ok(200),
            probe_gate: None,
            probe_calls: AtomicUsize::new(0),
        }
    }

    pub fn from_file(file: FixtureFile) -> Self {
        let mut me = Self::new()
            .with_catalog(Feed::Movies, file.movies)
            .with_catalog(Feed::TvShows, file.tv_shows)
            .with_catalog(Feed::VarietyShows, file.variety_shows)
            .with_short_dramas(file.short_dramas)
            .with_schedule(file.schedule);
        for (id, text) in file.details {
            me = me.with_detail(id, text);
        }
        me
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        let file: FixtureFile = serde_json::from_str(&data)
            .with_context(|| format!("parsing fixture {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    pub fn with_catalog(self, feed: Feed, items: Vec<CatalogItem>) -> Self {
        self.with_catalog_code(feed, CODE_OK, items)
    }

    pub fn with_catalog_code(mut self, feed: Feed, code: i64, list: Vec<CatalogItem>) -> Self {
        self.catalog.insert(feed, Scripted::Ok(CatalogPage { code, list }));
        self
    }

    pub fn with_short_dramas(mut self, items: Vec<CatalogItem>) -> Self {
        self.short_dramas = Scripted::Ok(items);
        self
    }

    pub fn with_schedule(mut self, days: Vec<DayBucket>) -> Self {
        self.schedule = Scripted::Ok(ScheduleReply::Days(days));
        self
    }

    pub fn with_schedule_reply(mut self, reply: ScheduleReply) -> Self {
        self.schedule = Scripted::Ok(reply);
        self
    }

    /// Make `feed` fail outright.
    pub fn failing(mut self, feed: Feed, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        match feed {
            Feed::ShortDramas => self.short_dramas = Scripted::Fail(cause),
            Feed::Schedule => self.schedule = Scripted::Fail(cause),
            catalog => {
                self.catalog.insert(catalog, Scripted::Fail(cause));
            }
        }
        self
    }

    pub fn with_detail(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.details.insert(id.into(), Scripted::Ok(Some(text.into())));
        self
    }

    pub fn failing_detail(mut self, id: impl Into<String>) -> Self {
        self.details
            .insert(id.into(), Scripted::Fail("detail unavailable".to_string()));
        self
    }

    /// `feed` will not answer until `gate` is notified.
    pub fn with_gate(mut self, feed: Feed, gate: Arc<Notify>) -> Self {
        self.gates.insert(feed, gate);
        self
    }

    /// Every detail request waits for one notification on `gate`.
    pub fn with_detail_gate(mut self, gate: Arc<Notify>) -> Self {
        self.detail_gate = Some(gate);
        self
    }

    pub fn with_probe_status(mut self, status: u16) -> Self {
        self.probe_status = Scripted::Ok(status);
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.probe_status = Scripted::Fail("connection refused".to_string());
        self
    }

    pub fn with_probe_gate(mut self, gate: Arc<Notify>) -> Self {
        self.probe_gate = Some(gate);
        self
    }

    /// Ids of every detail request issued so far, in call order.
    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    async fn wait_gate(&self, feed: Feed) {
        if let Some(g) = self.gates.get(&feed) {
            g.notified().await;
        }
    }

    async fn detail(&self, id: &str) -> Result<Option<String>> {
        self.detail_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.to_string());
        if let Some(g) = &self.detail_gate {
            g.notified().await;
        }
        match self.details.get(id) {
            Some(s) => s.get(),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Upstream for FixtureUpstream {
    async fn categories(&self, req: &CategoryRequest) -> Result<CatalogPage> {
        let feed = catalog_feed(req.source);
        self.wait_gate(feed).await;
        match self.catalog.get(&feed) {
            Some(s) => s.get(),
            None => Ok(CatalogPage {
                code: CODE_OK,
                list: Vec::new(),
            }),
        }
    }

    async fn catalog_detail(&self, id: &str) -> Result<DetailReply> {
        let plot_summary = self.detail(id).await?;
        Ok(DetailReply {
            code: CODE_OK,
            plot_summary,
        })
    }

    async fn recommended_short_dramas(&self, count: usize) -> Result<Vec<CatalogItem>> {
        self.wait_gate(Feed::ShortDramas).await;
        let mut items = self.short_dramas.get()?;
        items.truncate(count);
        Ok(items)
    }

    async fn short_drama_detail(&self, id: &str) -> Result<Option<String>> {
        self.detail(id).await
    }

    async fn weekly_schedule(&self) -> Result<ScheduleReply> {
        self.wait_gate(Feed::Schedule).await;
        self.schedule.get()
    }

    async fn anime_detail(&self, id: &str) -> Result<Option<String>> {
        self.detail(id).await
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[async_trait]
impl FlagEndpoint for FixtureUpstream {
    async fn probe(&self) -> Result<u16> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(g) = &self.probe_gate {
            g.notified().await;
        }
        self.probe_status.get()
    }
}
