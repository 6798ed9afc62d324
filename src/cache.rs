// src/cache.rs
//! Local short-drama result cache (one JSON file per entry) and its janitor.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Only files carrying this prefix belong to the short-drama cache.
pub const ENTRY_PREFIX: &str = "shortdrama-";

/// A prefixed `.tmp` file untouched for this long is a crashed writer's leftover.
pub const ORPHAN_TMP_AGE: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// Unix seconds.
    expires_at: u64,
    data: T,
}

#[derive(Debug, Deserialize)]
struct ExpiryOnly {
    expires_at: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorReport {
    pub scanned: usize,
    pub removed: usize,
    pub corrupt: usize,
    /// Abandoned temp files swept; not part of `scanned`.
    pub orphaned: usize,
}

#[derive(Debug)]
pub struct ShortDramaCache {
    dir: PathBuf,
}

impl ShortDramaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let _ = fs::create_dir_all(&dir); // best-effort
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{ENTRY_PREFIX}{}.json", sanitize(key)))
    }


    /// Fresh value for `key`, or `None` when missing, expired or unreadable.
    pub fn get<T: DeserializeOwned>(&self, key: &str, now: u64) -> Option<T> {
        let buf = fs::read_to_string(self.entry_path(key)).ok()?;
        let entry: CacheEntry<T> = serde_json::from_str(&buf).ok()?;
        (entry.expires_at > now).then_some(entry.data)
    }

    /// Write-then-rename so readers never see a half-written entry. Each
    /// write gets its own temp file, so concurrent writers never share one.
    pub fn put<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64, now: u64) -> io::Result<()> {
        let path = self.entry_path(key);
        let entry = CacheEntry {
            expires_at: now.saturating_add(ttl_secs),
            data: value,
        };
        let json = serde_json::to_vec(&entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("{ENTRY_PREFIX}{}.", sanitize(key)))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Delete every entry whose expiry is at or before `now`.
    ///
    /// An entry that cannot be read or parsed counts as expired. Prefixed
    /// `.tmp` files older than [`ORPHAN_TMP_AGE`] are removed too. A missing
    /// cache directory is an empty cache, not an error.
    pub fn clean_expired(&self, now: u64) -> io::Result<JanitorReport> {
        let mut report = JanitorReport::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e),
        };

        for e in entries.flatten() {
            let path = e.path();
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if !name.starts_with(ENTRY_PREFIX) {
                continue;
            }
            if name.ends_with(".tmp") {
                if is_orphan(&e, now) {
                    match fs::remove_file(&path) {
                        Ok(()) => report.orphaned += 1,
                        Err(err) => {
                            tracing::warn!(error = %err, path = %path.display(), "orphaned temp file removal failed")
                        }
                    }
                }
                continue;
            }
            if !name.ends_with(".json") {
                continue;
            }
            report.scanned += 1;

            let expiry = fs::read_to_string(&path)
                .ok()
                .and_then(|s| serde_json::from_str::<ExpiryOnly>(&s).ok())
                .map(|x| x.expires_at);
            let expired = match expiry {
                Some(ts) => ts <= now,
                None => {
                    report.corrupt += 1;
                    true
                }
            };
            if !expired {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(err) => {
                    tracing::warn!(error = %err, path = %path.display(), "cache entry removal failed")
                }
            }
        }

        counter!("cache_janitor_removed_total").increment(report.removed as u64);
        Ok(report)
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Last modified at least [`ORPHAN_TMP_AGE`] before `now` (unix seconds).
fn is_orphan(entry: &fs::DirEntry, now: u64) -> bool {
    let modified = entry
        .metadata()
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    match modified {
        Some(m) => m.saturating_add(ORPHAN_TMP_AGE.as_secs()) <= now,
        None => false,
    }
}

pub(crate) fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Fire-and-forget janitor run. Failures are logged and otherwise ignored.
pub fn spawn_clean(cache: Arc<ShortDramaCache>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match cache.clean_expired(now_unix()) {
        Ok(r) if r.removed > 0 || r.orphaned > 0 => tracing::info!(
            target: "cache",
            scanned = r.scanned,
            removed = r.removed,
            corrupt = r.corrupt,
            orphaned = r.orphaned,
            "expired short-drama cache entries removed"
        ),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, dir = %cache.dir().display(), "cache janitor failed"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_respects_expiry() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ShortDramaCache::new(tmp.path());
        cache.put("recommend-8", &vec![1, 2, 3], 60, 1_000).unwrap();
        assert_eq!(cache.get::<Vec<i32>>("recommend-8", 1_010), Some(vec![1, 2, 3]));
        assert_eq!(cache.get::<Vec<i32>>("recommend-8", 1_060), None);
    }

    #[test]
    fn keys_are_sanitized_into_prefixed_file_names() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ShortDramaCache::new(tmp.path());
        cache.put("a/b c", &1u8, 10, 0).unwrap();
        assert!(tmp.path().join("shortdrama-a_b_c.json").exists());
    }

    #[test]
    fn missing_dir_is_an_empty_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ShortDramaCache {
            dir: tmp.path().join("nope"),
        };
        assert_eq!(cache.clean_expired(5).unwrap(), JanitorReport::default());
    }

    #[test]
    fn put_leaves_no_temp_file_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ShortDramaCache::new(tmp.path());
        cache.put("k", &1u8, 10, 0).unwrap();
        let names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["shortdrama-k.json".to_string()]);
    }
}
