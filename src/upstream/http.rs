// src/upstream/http.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::UpstreamError;
use super::wire::{
    BangumiDay, BangumiSubject, DoubanDetailResult, DoubanResult, ShortDramaDetail, ShortDramaList,
};
use super::{CatalogPage, CategoryRequest, DetailReply, FlagEndpoint, ScheduleReply, Upstream};
use crate::cache::{now_unix, ShortDramaCache};
use crate::config::DashboardConfig;
use crate::model::CatalogItem;

/// Page size the catalog API serves the home rows with.
const CATALOG_PAGE_LIMIT: u32 = 20;

const NO_QUERY: [(&str, &str); 0] = [];

/// Talks to the app backend (catalog + short dramas + feature probe) and bangumi.
#[derive(Clone)]
pub struct HttpUpstream {
    client: Client,
    api_base: String,
    bangumi_base: String,
    probe_path: String,
    cache: Option<Arc<ShortDramaCache>>,
    cache_ttl_secs: u64,
}

impl HttpUpstream {
    pub fn from_config(
        cfg: &DashboardConfig,
        cache: Option<Arc<ShortDramaCache>>,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(cfg.upstream.user_agent.clone())
            .connect_timeout(Duration::from_secs(cfg.upstream.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.upstream.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: cfg.upstream.api_base.clone(),
            bangumi_base: cfg.upstream.bangumi_base.clone(),
            probe_path: cfg.probe.path.clone(),
            cache,
            cache_ttl_secs: cfg.short_drama.cache_ttl_secs,
        })
    }

    async fn get_json<T, Q>(&self, endpoint: &'static str, url: &str, query: &Q) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| UpstreamError::Http { endpoint, source })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| UpstreamError::Http { endpoint, source })?;
        serde_json::from_slice(&bytes).map_err(|source| UpstreamError::Decode { endpoint, source })
    }

    fn recommend_cache_key(count: usize) -> String {
        format!("recommend-{count}")
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn categories(&self, req: &CategoryRequest) -> Result<CatalogPage> {
        let url = format!("{}/api/douban/categories", self.api_base);
        let limit = CATALOG_PAGE_LIMIT.to_string();
        let query = [
            ("kind", req.kind),
            ("category", req.category),
            ("type", req.kind_type),
            ("start", "0"),
            ("limit", limit.as_str()),
        ];
        let raw: DoubanResult = self.get_json("douban categories", &url, &query).await?;
        Ok(CatalogPage {
            code: raw.code,
            list: raw.list.into_iter().map(|d| d.into_item(req.source)).collect(),
        })
    }

    async fn catalog_detail(&self, id: &str) -> Result<DetailReply> {
        let url = format!("{}/api/douban/details", self.api_base);
        let raw: DoubanDetailResult = self.get_json("douban details", &url, &[("id", id)]).await?;
        Ok(DetailReply {
            code: raw.code,
            plot_summary: raw.data.and_then(|d| d.plot_summary),
        })
    }

    async fn recommended_short_dramas(&self, count: usize) -> Result<Vec<CatalogItem>> {
        let key = Self::recommend_cache_key(count);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get::<Vec<CatalogItem>>(&key, now_unix()) {
                tracing::debug!(target: "upstream", count, "short-drama recommendations served from cache");
                return Ok(hit);
            }
        }

        let url = format!("{}/api/shortdrama/recommend", self.api_base);
        let size = count.to_string();
        let raw: ShortDramaList = self
            .get_json("shortdrama recommend", &url, &[("size", size.as_str())])
            .await?;
        let items = raw.into_items();

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &items, self.cache_ttl_secs, now_unix()) {
                tracing::warn!(error = %e, "short-drama cache write failed");
            }
        }
        Ok(items)
    }

    async fn short_drama_detail(&self, id: &str) -> Result<Option<String>> {
        let url = format!("{}/api/shortdrama/detail", self.api_base);
        let raw: ShortDramaDetail = self
            .get_json("shortdrama detail", &url, &[("id", id), ("episode", "1")])
            .await?;
        Ok(raw.desc)
    }

    async fn weekly_schedule(&self) -> Result<ScheduleReply> {
        let url = format!("{}/calendar", self.bangumi_base);
        let raw: serde_json::Value = self.get_json("bangumi calendar", &url, &NO_QUERY).await?;
        if !raw.is_array() {
            let shape = match &raw {
                serde_json::Value::Object(_) => "object",
                serde_json::Value::String(_) => "string",
                serde_json::Value::Null => "null",
                _ => "scalar",
            };
            return Ok(ScheduleReply::Unexpected(shape.to_string()));
        }
        let days: Vec<BangumiDay> = serde_json::from_value(raw).map_err(|source| {
            UpstreamError::Decode {
                endpoint: "bangumi calendar",
                source,
            }
        })?;
        Ok(ScheduleReply::Days(
            days.into_iter().map(BangumiDay::into_bucket).collect(),
        ))
    }

    async fn anime_detail(&self, id: &str) -> Result<Option<String>> {
        let url = format!("{}/v0/subjects/{}", self.bangumi_base, id);
        let raw: BangumiSubject = self.get_json("bangumi subject", &url, &NO_QUERY).await?;
        Ok(raw.summary)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[async_trait]
impl FlagEndpoint for HttpUpstream {
    async fn probe(&self) -> Result<u16> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            messages: Vec<Msg<'a>>,
        }

        let url = format!("{}{}", self.api_base, self.probe_path);
        let req = Req {
            messages: vec![Msg {
                role: "user",
                content: "test",
            }],
        };
        let resp = self
            .client
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|source| UpstreamError::Http {
                endpoint: "feature probe",
                source,
            })?;
        Ok(resp.status().as_u16())
    }
}
