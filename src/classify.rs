//! Classification of a probe into hit, miss, blocked, or transient error.
//!
//! Status codes are checked before any content heuristic: a short page that
//! arrives with a 404 is a miss, not a block.

use crate::fetch::{NetworkError, RawResponse};
use crate::models::{BlockReason, FetchOutcome};

/// Data-driven rules for spotting anti-bot or otherwise unusable pages.
#[derive(Debug, Clone, Default)]
pub struct ClassifierRules {
    /// Bodies with fewer characters than this (after trimming) are treated as blocked.
    pub min_content_length: usize,
    /// Phrases that only appear on anti-bot pages. Matched case-insensitively.
    pub blocked_page_markers: Vec<String>,
}

/// Pure mapping from a fetch result to a [`FetchOutcome`].
#[derive(Debug, Clone)]
pub struct Classifier {
    min_content_length: usize,
    /// (original, lowercased) pairs; the original is kept for logs.
    markers: Vec<(String, String)>,
}

impl Classifier {
    pub fn new(rules: ClassifierRules) -> Self {
        let markers = rules
            .blocked_page_markers
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .map(|m| {
                let lower = m.to_lowercase();
                (m, lower)
            })
            .collect();
        Self {
            min_content_length: rules.min_content_length,
            markers,
        }
    }

    pub fn classify(&self, result: Result<RawResponse, NetworkError>) -> FetchOutcome {
        let response = match result {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransientError(e.to_string()),
        };

        match response.status {
            404 | 410 => return FetchOutcome::Miss { status: response.status },
            403 => return FetchOutcome::Blocked(BlockReason::Forbidden(response.status)),
            // Server errors land here too and are indistinguishable from absence.
            status if status >= 400 => return FetchOutcome::Miss { status },
            _ => {}
        }

        if let Some(reason) = self.content_block_reason(&response.body) {
            return FetchOutcome::Blocked(reason);
        }
        FetchOutcome::Hit(response.body)
    }

    fn content_block_reason(&self, body: &str) -> Option<BlockReason> {
        let chars = body.trim().chars().count();
        if chars < self.min_content_length {
            return Some(BlockReason::TooShort {
                chars,
                min: self.min_content_length,
            });
        }

        if self.markers.is_empty() {
            return None;
        }
        let lower = body.to_lowercase();
        self.markers
            .iter()
            .find(|(_, needle)| lower.contains(needle.as_str()))
            .map(|(marker, _)| BlockReason::Marker(marker.clone()))
    }
}
