// src/dashboard/mod.rs
//! One dashboard session: fan out to every feed, publish each slice as it
//! settles, enrich the above-the-fold items in the background.

pub mod banner;
pub mod enrich;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{DashboardConfig, EnrichConfig};
use crate::model::{entries_for, CatalogItem, DayBucket, SourceKind, Weekday};
use crate::upstream::{
    CategoryRequest, Feed, ScheduleReply, Upstream, CODE_OK, HOT_MOVIES, HOT_TV, HOT_VARIETY,
};

/// The four list slices of the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Movies,
    TvShows,
    VarietyShows,
    ShortDramas,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Movies,
        Category::TvShows,
        Category::VarietyShows,
        Category::ShortDramas,
    ];

    pub fn feed(self) -> Feed {
        match self {
            Category::Movies => Feed::Movies,
            Category::TvShows => Feed::TvShows,
            Category::VarietyShows => Feed::VarietyShows,
            Category::ShortDramas => Feed::ShortDramas,
        }
    }

    pub fn kind(self) -> SourceKind {
        match self {
            Category::Movies => SourceKind::Movie,
            Category::TvShows => SourceKind::Tv,
            Category::VarietyShows => SourceKind::Variety,
            Category::ShortDramas => SourceKind::ShortDrama,
        }
    }

    fn request(self) -> Option<&'static CategoryRequest> {
        match self {
            Category::Movies => Some(&HOT_MOVIES),
            Category::TvShows => Some(&HOT_TV),
            Category::VarietyShows => Some(&HOT_VARIETY),
            Category::ShortDramas => None,
        }
    }

    /// Leading items shown in the banner, and therefore enriched.
    pub fn lead_count(self, cfg: &EnrichConfig) -> usize {
        match self {
            Category::Movies => cfg.movies,
            Category::TvShows => cfg.tv_shows,
            Category::VarietyShows => cfg.variety_shows,
            Category::ShortDramas => cfg.short_dramas,
        }
    }
}

/// Per-session view state. Each slice has exactly one full writer (the branch
/// that fetched it); enrichment only patches individual items.
#[derive(Debug)]
pub struct ViewState {
    movies: watch::Sender<Vec<CatalogItem>>,
    tv_shows: watch::Sender<Vec<CatalogItem>>,
    variety_shows: watch::Sender<Vec<CatalogItem>>,
    short_dramas: watch::Sender<Vec<CatalogItem>>,
    schedule: watch::Sender<Vec<DayBucket>>,
    loading: watch::Sender<bool>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            movies: watch::Sender::new(Vec::new()),
            tv_shows: watch::Sender::new(Vec::new()),
            variety_shows: watch::Sender::new(Vec::new()),
            short_dramas: watch::Sender::new(Vec::new()),
            schedule: watch::Sender::new(Vec::new()),
            loading: watch::Sender::new(true),
        }
    }

    fn slice(&self, category: Category) -> &watch::Sender<Vec<CatalogItem>> {
        match category {
            Category::Movies => &self.movies,
            Category::TvShows => &self.tv_shows,
            Category::VarietyShows => &self.variety_shows,
            Category::ShortDramas => &self.short_dramas,
        }
    }

    pub fn items(&self, category: Category) -> Vec<CatalogItem> {
        self.slice(category).borrow().clone()
    }

    pub fn schedule(&self) -> Vec<DayBucket> {
        self.schedule.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe(&self, category: Category) -> watch::Receiver<Vec<CatalogItem>> {
        self.slice(category).subscribe()
    }

    pub fn subscribe_schedule(&self) -> watch::Receiver<Vec<DayBucket>> {
        self.schedule.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn publish(&self, category: Category, items: Vec<CatalogItem>) {
        self.slice(category).send_replace(items);
    }

    pub fn publish_schedule(&self, days: Vec<DayBucket>) {
        self.schedule.send_replace(days);
    }

    /// Returns whether the slice changed.
    pub fn patch(&self, category: Category, id: &str, description: &str) -> bool {
        self.slice(category)
            .send_if_modified(|items| enrich::apply_description(items, id, description))
    }

    pub fn patch_schedule(&self, weekday: Weekday, id: &str, description: &str) -> bool {
        self.schedule.send_if_modified(|days| {
            enrich::apply_schedule_description(days, weekday, id, description)
        })
    }

    fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
    }
}

/// Cleared at teardown; background work checks it before writing.
#[derive(Debug, Clone)]
pub struct Lifetime(Arc<AtomicBool>);

impl Default for Lifetime {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl Lifetime {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn end(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum FeedOutcome {
    /// Slice replaced with this many items.
    Loaded(usize),
    /// Answered, but with a status code or shape we do not accept.
    Rejected(String),
    Failed(String),
}

impl FeedOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FeedOutcome::Loaded(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub outcomes: Vec<(Feed, FeedOutcome)>,
    pub elapsed_ms: u64,
}

impl LoadReport {
    pub fn outcome(&self, feed: Feed) -> Option<&FeedOutcome> {
        self.outcomes.iter().find(|(f, _)| *f == feed).map(|(_, o)| o)
    }

    pub fn loaded_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_loaded()).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeSnapshot {
    pub loading: bool,
    pub weekday: Weekday,
    pub movies: Vec<CatalogItem>,
    pub tv_shows: Vec<CatalogItem>,
    pub variety_shows: Vec<CatalogItem>,
    pub short_dramas: Vec<CatalogItem>,
    pub schedule: Vec<DayBucket>,
    pub today_anime: Vec<CatalogItem>,
    pub banner: Vec<CatalogItem>,
}

pub struct Dashboard {
    upstream: Arc<dyn Upstream>,
    enrich: EnrichConfig,
    short_drama_count: usize,
    weekday: Weekday,
    state: Arc<ViewState>,
    lifetime: Lifetime,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Dashboard {
    pub fn new(upstream: Arc<dyn Upstream>, cfg: &DashboardConfig) -> Self {
        Self {
            upstream,
            enrich: cfg.enrich.clone(),
            short_drama_count: cfg.short_drama.recommend_count,
            weekday: Weekday::today(),
            state: Arc::new(ViewState::new()),
            lifetime: Lifetime::default(),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_weekday(mut self, weekday: Weekday) -> Self {
        self.weekday = weekday;
        self
    }

    pub fn state(&self) -> Arc<ViewState> {
        Arc::clone(&self.state)
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    /// Fetch every feed concurrently and wait for all of them to settle.
    ///
    /// Slices are published as their own fetch settles; the loading flag
    /// flips to false once, after the last one.
    pub async fn load(&self) -> LoadReport {
        let t0 = Instant::now();
        self.state.set_loading(true);

        let (movies, tv, variety, dramas, schedule) = tokio::join!(
            self.load_category(Category::Movies),
            self.load_category(Category::TvShows),
            self.load_category(Category::VarietyShows),
            self.load_category(Category::ShortDramas),
            self.load_schedule(),
        );

        self.state.set_loading(false);

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        histogram!("dashboard_load_ms").record(elapsed_ms as f64);
        let report = LoadReport {
            outcomes: vec![
                (Feed::Movies, movies),
                (Feed::TvShows, tv),
                (Feed::VarietyShows, variety),
                (Feed::ShortDramas, dramas),
                (Feed::Schedule, schedule),
            ],
            elapsed_ms,
        };
        info!(
            target: "dashboard",
            upstream = self.upstream.name(),
            loaded = report.loaded_count(),
            elapsed_ms,
            "dashboard feeds settled"
        );
        report
    }

    async fn load_category(&self, category: Category) -> FeedOutcome {
        let feed = category.feed();
        let fetched = match category.request() {
            Some(req) => self.upstream.categories(req).await.map(|page| {
                if page.code == CODE_OK {
                    Ok(page.list)
                } else {
                    Err(format!("unexpected status code {}", page.code))
                }
            }),
            None => self
                .upstream
                .recommended_short_dramas(self.short_drama_count)
                .await
                .map(Ok),
        };

        match fetched {
            Ok(Ok(items)) => {
                let count = items.len();
                let leads: Vec<String> = items
                    .iter()
                    .take(category.lead_count(&self.enrich))
                    .map(|it| it.id.clone())
                    .collect();
                self.state.publish(category, items);
                for id in leads {
                    self.spawn_item_enrichment(category, id);
                }
                FeedOutcome::Loaded(count)
            }
            Ok(Err(reason)) => {
                warn!(target: "dashboard", feed = feed.name(), %reason, "feed rejected; keeping previous slice");
                counter!("dashboard_source_errors_total", "source" => feed.name()).increment(1);
                FeedOutcome::Rejected(reason)
            }
            Err(e) => {
                warn!(target: "dashboard", feed = feed.name(), error = ?e, "feed failed; keeping previous slice");
                counter!("dashboard_source_errors_total", "source" => feed.name()).increment(1);
                FeedOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    async fn load_schedule(&self) -> FeedOutcome {
        let feed = Feed::Schedule;
        match self.upstream.weekly_schedule().await {
            Ok(ScheduleReply::Days(days)) => {
                let count = days.len();
                let target = enrich::schedule_target(&days, self.weekday);
                self.state.publish_schedule(days);
                if let Some(id) = target {
                    self.spawn_schedule_enrichment(id);
                }
                FeedOutcome::Loaded(count)
            }
            Ok(ScheduleReply::Unexpected(shape)) => {
                let reason = format!("expected a list of days, got {shape}");
                warn!(target: "dashboard", feed = feed.name(), %reason, "feed rejected; keeping previous slice");
                counter!("dashboard_source_errors_total", "source" => feed.name()).increment(1);
                FeedOutcome::Rejected(reason)
            }
            Err(e) => {
                warn!(target: "dashboard", feed = feed.name(), error = ?e, "feed failed; keeping previous slice");
                counter!("dashboard_source_errors_total", "source" => feed.name()).increment(1);
                FeedOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    fn spawn_item_enrichment(&self, category: Category, id: String) {
        let upstream = Arc::clone(&self.upstream);
        let state = Arc::clone(&self.state);
        let lifetime = self.lifetime.clone();
        let kind = category.kind();
        self.track(tokio::spawn(async move {
            let desc = match enrich::fetch_description(upstream.as_ref(), kind, &id).await {
                Ok(Some(d)) => d,
                Ok(None) => return,
                Err(e) => {
                    warn!(target: "dashboard", kind = kind.as_str(), %id, error = ?e, "detail fetch failed");
                    counter!("dashboard_enrich_failed_total").increment(1);
                    return;
                }
            };
            if !lifetime.is_alive() {
                return;
            }
            if state.patch(category, &id, &desc) {
                debug!(target: "dashboard", kind = kind.as_str(), %id, "description patched");
                counter!("dashboard_enrich_patched_total").increment(1);
            }
        }));
    }

    fn spawn_schedule_enrichment(&self, id: String) {
        let upstream = Arc::clone(&self.upstream);
        let state = Arc::clone(&self.state);
        let lifetime = self.lifetime.clone();
        let weekday = self.weekday;
        self.track(tokio::spawn(async move {
            let desc = match enrich::fetch_description(upstream.as_ref(), SourceKind::Anime, &id).await {
                Ok(Some(d)) => d,
                Ok(None) => return,
                Err(e) => {
                    warn!(target: "dashboard", kind = "anime", %id, error = ?e, "detail fetch failed");
                    counter!("dashboard_enrich_failed_total").increment(1);
                    return;
                }
            };
            if lifetime.is_alive() && state.patch_schedule(weekday, &id, &desc) {
                debug!(target: "dashboard", kind = "anime", %id, "description patched");
                counter!("dashboard_enrich_patched_total").increment(1);
            }
        }));
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Wait for outstanding enrichment, at most `grace`. Returns true when
    /// everything finished in time; stragglers keep running detached.
    pub async fn settle_background(&self, grace: Duration) -> bool {
        let handles =
            std::mem::take(&mut *self.background.lock().unwrap_or_else(PoisonError::into_inner));
        if handles.is_empty() {
            return true;
        }
        tokio::time::timeout(grace, futures::future::join_all(handles))
            .await
            .is_ok()
    }

    /// Suppress every background write from now on. In-flight requests are not aborted.
    pub fn teardown(&self) {
        self.lifetime.end();
    }

    pub fn is_torn_down(&self) -> bool {
        !self.lifetime.is_alive()
    }

    pub fn snapshot(&self) -> HomeSnapshot {
        let schedule = self.state.schedule();
        let today_anime = entries_for(&schedule, self.weekday).to_vec();
        let loading = self.state.is_loading();
        let movies = self.state.items(Category::Movies);
        let tv_shows = self.state.items(Category::TvShows);
        let variety_shows = self.state.items(Category::VarietyShows);
        let short_dramas = self.state.items(Category::ShortDramas);
        let banner = banner::compose(
            &banner::BannerInput {
                loading,
                movies: &movies,
                tv_shows: &tv_shows,
                variety_shows: &variety_shows,
                short_dramas: &short_dramas,
                today_anime: &today_anime,
            },
            &self.enrich,
        );
        HomeSnapshot {
            loading,
            weekday: self.weekday,
            movies,
            tv_shows,
            variety_shows,
            short_dramas,
            schedule,
            today_anime,
            banner,
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.lifetime.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_view_state_is_loading_with_empty_slices() {
        let s = ViewState::new();
        assert!(s.is_loading());
        for c in Category::ALL {
            assert!(s.items(c).is_empty());
        }
        assert!(s.schedule().is_empty());
    }

    #[test]
    fn patch_without_subscribers_still_applies() {
        let s = ViewState::new();
        s.publish(
            Category::Movies,
            vec![CatalogItem::new(SourceKind::Movie, "m1", "M")],
        );
        assert!(s.patch(Category::Movies, "m1", "plot"));
        assert!(!s.patch(Category::Movies, "m1", "plot"));
        assert_eq!(
            s.items(Category::Movies)[0].description.as_deref(),
            Some("plot")
        );
    }

    #[test]
    fn lifetime_ends_once_for_all_clones() {
        let l = Lifetime::default();
        let c = l.clone();
        assert!(c.is_alive());
        l.end();
        assert!(!c.is_alive());
    }
}
