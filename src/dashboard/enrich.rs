// src/dashboard/enrich.rs
//! Background detail enrichment: fetch a plot summary, then patch it into the
//! published slice by id.

use anyhow::Result;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::model::{CatalogItem, DayBucket, SourceKind, Weekday};
use crate::upstream::{Upstream, CODE_OK};

const MAX_DESCRIPTION_CHARS: usize = 1500;

/// Normalize upstream summary text: decode entities, strip tags, collapse
/// whitespace, cap the length. Returns `None` when nothing is left.
pub fn normalize_description(s: &str) -> Option<String> {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_DESCRIPTION_CHARS {
        out = out.chars().take(MAX_DESCRIPTION_CHARS).collect();
    }
    (!out.is_empty()).then_some(out)
}

/// Ask the detail endpoint matching `kind` for a description of `id`.
pub async fn fetch_description(
    upstream: &dyn Upstream,
    kind: SourceKind,
    id: &str,
) -> Result<Option<String>> {
    let raw = match kind {
        SourceKind::Movie | SourceKind::Tv | SourceKind::Variety => {
            let reply = upstream.catalog_detail(id).await?;
            if reply.code != CODE_OK {
                return Ok(None);
            }
            reply.plot_summary
        }
        SourceKind::ShortDrama => upstream.short_drama_detail(id).await?,
        SourceKind::Anime => upstream.anime_detail(id).await?,
    };
    Ok(raw.as_deref().and_then(normalize_description))
}

/// Set the description of the item with `id`. Returns whether anything changed;
/// a missing id or an identical description is a no-op.
pub fn apply_description(items: &mut [CatalogItem], id: &str, description: &str) -> bool {
    match items.iter_mut().find(|it| it.id == id) {
        Some(it) if it.description.as_deref() != Some(description) => {
            it.description = Some(description.to_string());
            true
        }
        _ => false,
    }
}

/// Same as [`apply_description`], scoped to the bucket for `weekday`.
pub fn apply_schedule_description(
    schedule: &mut [DayBucket],
    weekday: Weekday,
    id: &str,
    description: &str,
) -> bool {
    schedule
        .iter_mut()
        .filter(|b| b.weekday == weekday)
        .any(|b| apply_description(&mut b.items, id, description))
}

/// The today entry worth enriching: first of today's bucket, only if it has no description yet.
pub fn schedule_target(schedule: &[DayBucket], weekday: Weekday) -> Option<String> {
    crate::model::entries_for(schedule, weekday)
        .first()
        .filter(|it| !it.has_description())
        .map(|it| it.id.clone())
}
