//! Data models shared by the scan engine and its collaborators.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleId`] and [`Cursor`]: positions in the site's numeric ID space
//! - [`ArticleUrl`]: maps an ID onto the site's article URL scheme
//! - [`FetchOutcome`]: classification of a single probe
//! - [`DiscoveredItem`]: a confirmed article as handed to the feed emitter
//! - [`FeedEntry`]: the extracted, publishable form of an article

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use url::Url;

/// Placeholder substituted with the article ID in `articleUrlTemplate`.
pub const ID_PLACEHOLDER: &str = "{id}";

/// A strictly positive article identifier.
///
/// Larger IDs are newer articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArticleId(NonZeroU64);

impl ArticleId {
    /// Returns `None` for zero, which is never a valid article.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// The next candidate, or `None` once the ID space is exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// High-water mark of crawl progress: the newest article confirmed so far.
///
/// Zero means "nothing confirmed yet"; scanning then begins at ID 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor(u64);

impl Cursor {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// First ID to probe when resuming from this cursor.
    pub fn next_candidate(self) -> Option<ArticleId> {
        self.0.checked_add(1).and_then(ArticleId::new)
    }

    /// Move the cursor forward to `id`. Never moves it backwards.
    pub fn advance_to(&mut self, id: ArticleId) {
        self.0 = self.0.max(id.get());
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds article URLs from the site base and a path template.
///
/// The template must contain [`ID_PLACEHOLDER`], e.g. `/news/{id}.html`.
#[derive(Debug, Clone)]
pub struct ArticleUrl {
    base: Url,
    template: String,
}

impl ArticleUrl {
    pub fn new(base: Url, template: impl Into<String>) -> Self {
        Self {
            base,
            template: template.into(),
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn for_id(&self, id: ArticleId) -> Result<Url, url::ParseError> {
        let path = self.template.replace(ID_PLACEHOLDER, &id.to_string());
        self.base.join(&path)
    }
}

/// Why a probe was classified as [`FetchOutcome::Blocked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The server answered with a forbidden status.
    Forbidden(u16),
    /// The body is shorter than the configured minimum.
    TooShort { chars: usize, min: usize },
    /// The body contains a known anti-bot marker phrase.
    Marker(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Forbidden(status) => write!(f, "forbidden status {status}"),
            BlockReason::TooShort { chars, min } => {
                write!(f, "body too short ({chars} < {min} chars)")
            }
            BlockReason::Marker(marker) => write!(f, "marker phrase {marker:?}"),
        }
    }
}

/// Result of probing one [`ArticleId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The article exists; carries the raw page body.
    Hit(String),
    /// No article at this ID.
    Miss { status: u16 },
    /// The site served an anti-bot or otherwise unusable page.
    Blocked(BlockReason),
    /// The request never produced a response.
    TransientError(String),
}

/// A confirmed article, produced only from a [`FetchOutcome::Hit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    pub id: ArticleId,
    pub raw_content: String,
    pub fetched_at: DateTime<Utc>,
}

/// A publishable feed entry extracted from a [`DiscoveredItem`].
///
/// This is also the record format of the JSON item archive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedEntry {
    pub id: u64,
    pub title: String,
    pub link: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}
