//! Feed emission: the only consumer of discovered articles.
//!
//! # Submodules
//!
//! - [`json`]: rolling archive of published entries, so each run's feed keeps
//!   the history of earlier runs
//! - [`rss`]: RSS 2.0 rendering
//!
//! # Output Structure
//!
//! ```text
//! state/
//! └── items.json   # archive, newest first, at most `feed.maxItems` entries
//! docs/
//! └── feed.xml     # RSS 2.0 document rendered from the archive
//! ```
//!
//! Both files are replaced atomically. The archive is written before the feed;
//! if either write fails the run fails and the cursor is not advanced.

pub mod json;
pub mod rss;

use crate::extract::feed_entry;
use crate::models::{ArticleUrl, DiscoveredItem, FeedEntry};
use crate::utils::write_atomic;
use chrono::Utc;
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("feed archive serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RSS rendering failed: {0}")]
    Xml(String),
    #[error("cannot build article link: {0}")]
    Url(#[from] url::ParseError),
}

/// Receives the items discovered by a run, in increasing ID order.
pub trait FeedEmitter {
    fn emit(&self, items: Vec<DiscoveredItem>) -> Result<(), FeedError>;
}

/// Immutable settings for [`RssFeedEmitter`].
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub urls: ArticleUrl,
    pub output_path: PathBuf,
    pub archive_path: PathBuf,
    pub title: String,
    pub description: String,
    pub max_items: usize,
    pub description_max_chars: usize,
}

/// Writes the JSON archive and the RSS document.
#[derive(Debug, Clone)]
pub struct RssFeedEmitter {
    settings: FeedSettings,
}

impl RssFeedEmitter {
    pub fn new(settings: FeedSettings) -> Self {
        Self { settings }
    }
}

impl FeedEmitter for RssFeedEmitter {
    #[instrument(level = "info", skip_all, fields(items = items.len(), output = %self.settings.output_path.display()))]
    fn emit(&self, items: Vec<DiscoveredItem>) -> Result<(), FeedError> {
        let fresh = items
            .iter()
            .map(|item| {
                let link = self.settings.urls.for_id(item.id)?;
                Ok(feed_entry(item, &link, self.settings.description_max_chars))
            })
            .collect::<Result<Vec<_>, FeedError>>()?;

        let archived = json::load_archive(&self.settings.archive_path);
        let entries = merge_entries(fresh, archived, self.settings.max_items);
        json::write_archive(&entries, &self.settings.archive_path)?;

        let channel = rss::Channel {
            title: &self.settings.title,
            link: self.settings.urls.base().as_str(),
            description: &self.settings.description,
        };
        let xml = rss::render(&channel, &entries, Utc::now())?;
        write_atomic(&self.settings.output_path, xml.as_bytes())?;

        info!(entries = entries.len(), "Wrote RSS feed");
        Ok(())
    }
}

/// Newest-first union of `fresh` and `archived`, capped at `max_items`.
///
/// A fresh entry replaces an archived one with the same ID.
pub fn merge_entries(fresh: Vec<FeedEntry>, archived: Vec<FeedEntry>, max_items: usize) -> Vec<FeedEntry> {
    fresh
        .into_iter()
        .chain(archived)
        .unique_by(|entry| entry.id)
        .sorted_by(|a, b| b.id.cmp(&a.id))
        .take(max_items)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleId;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use url::Url;

    fn entry(id: u64, title: &str) -> FeedEntry {
        FeedEntry {
            id,
            title: title.to_string(),
            link: format!("https://www.example.com/news/{id}.html"),
            content: String::new(),
            published_at: DateTime::parse_from_rfc3339("2025-05-06T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    fn item(id: u64, title: &str) -> DiscoveredItem {
        DiscoveredItem {
            id: ArticleId::new(id).unwrap(),
            raw_content: format!(
                "<html><head><title>{title}</title></head><body><p>Body of {id}</p></body></html>"
            ),
            fetched_at: Utc::now(),
        }
    }

    fn settings(dir: &std::path::Path, max_items: usize) -> FeedSettings {
        FeedSettings {
            urls: ArticleUrl::new(Url::parse("https://www.example.com").unwrap(), "/news/{id}.html"),
            output_path: dir.join("docs").join("feed.xml"),
            archive_path: dir.join("state").join("items.json"),
            title: "Example News".to_string(),
            description: "Everything new".to_string(),
            max_items,
            description_max_chars: 400,
        }
    }

    #[test]
    fn test_merge_orders_newest_first_and_caps() {
        let merged = merge_entries(
            vec![entry(105, "new"), entry(106, "newer")],
            vec![entry(103, "old"), entry(101, "older"), entry(100, "oldest")],
            4,
        );
        let ids: Vec<u64> = merged.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![106, 105, 103, 101]);
    }

    #[test]
    fn test_merge_prefers_fresh_entry() {
        let merged = merge_entries(vec![entry(5, "fresh")], vec![entry(5, "stale")], 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "fresh");
    }

    #[test]
    fn test_emit_writes_archive_and_feed() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path(), 10);
        let emitter = RssFeedEmitter::new(settings.clone());

        emitter.emit(vec![item(101, "First"), item(102, "Second")]).unwrap();

        let archived = json::load_archive(&settings.archive_path);
        let ids: Vec<u64> = archived.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![102, 101]);
        assert_eq!(archived[0].link, "https://www.example.com/news/102.html");
        assert_eq!(archived[0].content, "Body of 102");

        let xml = std::fs::read_to_string(&settings.output_path).unwrap();
        assert!(xml.contains("<title>Second</title>"));
        assert!(xml.find("Second").unwrap() < xml.find("First").unwrap());
    }

    #[test]
    fn test_emit_keeps_history_across_runs() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path(), 3);
        let emitter = RssFeedEmitter::new(settings.clone());

        emitter.emit(vec![item(101, "A"), item(102, "B")]).unwrap();
        emitter.emit(vec![item(104, "C"), item(105, "D")]).unwrap();

        let ids: Vec<u64> = json::load_archive(&settings.archive_path)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![105, 104, 102]);

        let xml = std::fs::read_to_string(&settings.output_path).unwrap();
        assert_eq!(xml.matches("<item>").count(), 3);
    }
}
