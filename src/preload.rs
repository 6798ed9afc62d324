// src/preload.rs
//! Low-priority image preload hints, emitted as `Link` response headers.

use std::sync::{Arc, Mutex, PoisonError};

/// At most this many URLs are hinted per call.
pub const MAX_PRELOAD: usize = 10;

pub fn link_header_value(url: &str) -> String {
    format!("<{url}>; rel=preload; as=image; fetchpriority=low")
}

/// The set of hints currently in effect for one response.
#[derive(Debug, Clone, Default)]
pub struct PreloadHead {
    links: Arc<Mutex<Vec<String>>>,
}

impl PreloadHead {
    /// Hint the first [`MAX_PRELOAD`] URLs, skipping blanks and URLs already
    /// hinted. The guard withdraws exactly what this call added.
    pub fn preload<I, S>(&self, urls: I) -> PreloadGuard
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inserted = Vec::new();
        let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        for url in urls.into_iter().take(MAX_PRELOAD) {
            let url = url.as_ref().trim();
            if url.is_empty() || links.iter().any(|l| l == url) {
                continue;
            }
            links.push(url.to_string());
            inserted.push(url.to_string());
        }
        drop(links);
        PreloadGuard {
            head: self.clone(),
            inserted,
        }
    }

    pub fn links(&self) -> Vec<String> {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[must_use = "dropping the guard withdraws its hints"]
#[derive(Debug)]
pub struct PreloadGuard {
    head: PreloadHead,
    inserted: Vec<String>,
}

impl PreloadGuard {
    pub fn inserted(&self) -> &[String] {
        &self.inserted
    }

    pub fn header_values(&self) -> impl Iterator<Item = String> + '_ {
        self.inserted.iter().map(|u| link_header_value(u))
    }
}

impl Drop for PreloadGuard {
    fn drop(&mut self) {
        let mut links = self
            .head
            .links
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        links.retain(|l| !self.inserted.contains(l));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_ten_and_skips_blank_and_duplicates() {
        let head = PreloadHead::default();
        let mut urls: Vec<String> = (0..12).map(|i| format!("https://img/{i}.jpg")).collect();
        urls[1] = String::new();
        urls[2] = urls[0].clone();
        let g = head.preload(&urls);
        // 10 considered, minus one blank and one duplicate
        assert_eq!(g.inserted().len(), 8);
        assert!(!head.links().contains(&"https://img/10.jpg".to_string()));
    }

    #[test]
    fn guard_removes_only_its_own_hints() {
        let head = PreloadHead::default();
        let first = head.preload(["a", "b"]);
        {
            let second = head.preload(["b", "c"]);
            assert_eq!(second.inserted(), ["c".to_string()]);
            assert_eq!(head.links(), ["a", "b", "c"]);
        }
        assert_eq!(head.links(), ["a", "b"]);
        drop(first);
        assert!(head.links().is_empty());
    }

    #[test]
    fn header_value_marks_low_priority_image() {
        assert_eq!(
            link_header_value("https://x/p.jpg"),
            "<https://x/p.jpg>; rel=preload; as=image; fetchpriority=low"
        );
    }
}
