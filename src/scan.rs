//! The scan engine: a resumable, sequential walk over the article ID space.
//!
//! A run loads the cursor, probes `cursor + 1`, `cursor + 2`, ... one at a
//! time and stops when any of these happens:
//!
//! - the per-run attempt ceiling is reached
//! - the consecutive-miss threshold is reached (the frontier of published
//!   articles has most likely been passed)
//! - the run deadline expires or the run is cancelled
//! - the ID space is exhausted
//!
//! Misses, blocked pages and exhausted network retries all count towards the
//! consecutive-miss threshold; a hit resets it. Whatever the stop reason,
//! discovered items are handed to the feed emitter and the cursor is then
//! saved. A run that discovers nothing writes nothing.

use crate::classify::Classifier;
use crate::cursor::CursorStore;
use crate::error::{CrawlError, CrawlResult};
use crate::fetch::Fetcher;
use crate::models::{ArticleId, ArticleUrl, Cursor, DiscoveredItem, FetchOutcome};
use crate::outputs::FeedEmitter;
use chrono::Utc;
use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Immutable settings for one [`ScanEngine`].
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub urls: ArticleUrl,
    pub per_run_attempt_ceiling: u32,
    pub consecutive_miss_threshold: u32,
    pub request_timeout: Duration,
    pub pacing: Pacing,
    pub run_deadline: Option<Duration>,
}

/// Randomized politeness delay between probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// A delay drawn uniformly from `[min, max]`. An inverted range collapses to `min`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn is_disabled(&self) -> bool {
        self.max.is_zero()
    }

    pub fn next_delay(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        if max_ms <= min_ms {
            return self.min;
        }
        Duration::from_millis(rng().random_range(min_ms..=max_ms))
    }
}

/// Why a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    AttemptCeiling,
    MissThreshold,
    Deadline,
    Cancelled,
    IdSpaceExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::AttemptCeiling => "attempt ceiling reached",
            StopReason::MissThreshold => "consecutive miss threshold reached",
            StopReason::Deadline => "run deadline expired",
            StopReason::Cancelled => "cancelled",
            StopReason::IdSpaceExhausted => "ID space exhausted",
        };
        f.write_str(s)
    }
}

/// Mutable state of one scan; discarded once folded into the cursor and feed.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub cursor: Cursor,
    pub attempted: u32,
    pub consecutive_misses: u32,
    /// In strictly increasing ID order.
    pub items: Vec<DiscoveredItem>,
    pub misses: u32,
    pub blocked: u32,
    pub transient: u32,
}

impl RunState {
    pub fn new(cursor: Cursor) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// Apply the outcome of probing `id`.
    pub fn record(&mut self, id: ArticleId, url: &Url, outcome: FetchOutcome) {
        self.attempted += 1;
        match outcome {
            FetchOutcome::Hit(raw_content) => {
                info!(%id, %url, bytes = raw_content.len(), "Discovered article");
                self.items.push(DiscoveredItem {
                    id,
                    raw_content,
                    fetched_at: Utc::now(),
                });
                self.cursor.advance_to(id);
                self.consecutive_misses = 0;
            }
            FetchOutcome::Miss { status } => {
                self.misses += 1;
                self.consecutive_misses += 1;
                debug!(%id, status, consecutive = self.consecutive_misses, "No article");
            }
            FetchOutcome::Blocked(reason) => {
                self.blocked += 1;
                self.consecutive_misses += 1;
                warn!(%id, %url, %reason, consecutive = self.consecutive_misses, "Article page looks blocked");
            }
            FetchOutcome::TransientError(error) => {
                self.transient += 1;
                self.consecutive_misses += 1;
                warn!(%id, %url, %error, consecutive = self.consecutive_misses, "Probe failed after retries; counting as miss");
            }
        }
    }
}

/// A scan that has stopped but whose results are not yet persisted.
#[derive(Debug)]
pub struct FinishedScan {
    pub previous_cursor: Cursor,
    pub state: RunState,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

impl FinishedScan {
    pub fn report(&self, persisted: bool) -> ScanReport {
        ScanReport {
            previous_cursor: self.previous_cursor,
            cursor: self.state.cursor,
            attempted: self.state.attempted,
            misses: self.state.misses,
            blocked: self.state.blocked,
            transient: self.state.transient,
            discovered: self.state.items.iter().map(|item| item.id).collect(),
            stop_reason: self.stop_reason,
            elapsed: self.elapsed,
            persisted,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub previous_cursor: Cursor,
    pub cursor: Cursor,
    pub attempted: u32,
    pub misses: u32,
    pub blocked: u32,
    pub transient: u32,
    pub discovered: Vec<ArticleId>,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    /// Whether the feed and cursor were written.
    pub persisted: bool,
}

pub struct ScanEngine<F, S> {
    fetcher: F,
    store: S,
    classifier: Classifier,
    settings: ScanSettings,
    cancel: CancellationToken,
}

impl<F, S> ScanEngine<F, S>
where
    F: Fetcher,
    S: CursorStore,
{
    pub fn new(fetcher: F, store: S, classifier: Classifier, settings: ScanSettings) -> Self {
        Self {
            fetcher,
            store,
            classifier,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the run at the next probe or pause when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scan, then emit discovered items and save the cursor.
    pub async fn run<E: FeedEmitter>(&self, emitter: &E) -> CrawlResult<ScanReport> {
        let finished = self.scan().await?;
        self.finish(finished, emitter)
    }

    /// Scan and log what would be published, writing neither feed nor cursor.
    pub async fn dry_run(&self) -> CrawlResult<ScanReport> {
        let finished = self.scan().await?;
        for item in &finished.state.items {
            info!(id = %item.id, bytes = item.raw_content.len(), "[DRY RUN] would publish");
        }
        Ok(finished.report(false))
    }

    /// Scan without persisting anything.
    #[instrument(level = "info", skip_all)]
    pub async fn scan(&self) -> CrawlResult<FinishedScan> {
        let started = Instant::now();
        // A budget too large to represent as an instant never expires.
        let deadline = self
            .settings
            .run_deadline
            .and_then(|budget| started.checked_add(budget));
        let previous_cursor = self.store.load();
        let mut state = RunState::new(previous_cursor);
        let mut candidate = previous_cursor.next_candidate();

        info!(
            cursor = %previous_cursor,
            ceiling = self.settings.per_run_attempt_ceiling,
            threshold = self.settings.consecutive_miss_threshold,
            deadline = ?self.settings.run_deadline,
            "Scan starting"
        );

        let stop_reason = loop {
            if let Some(reason) = self.limit_reached(&state) {
                break reason;
            }
            if let Some(reason) = self.interrupted(deadline) {
                break reason;
            }
            let Some(id) = candidate else {
                break StopReason::IdSpaceExhausted;
            };
            let url = self
                .settings
                .urls
                .for_id(id)
                .map_err(|e| CrawlError::Config(format!("cannot build URL for article {id}: {e}")))?;

            let probe = self.fetcher.get(&url, self.settings.request_timeout);
            let result = match self.interruptible(probe, deadline).await {
                Ok(result) => result,
                Err(reason) => break reason,
            };
            state.record(id, &url, self.classifier.classify(result));
            candidate = id.next();

            if self.limit_reached(&state).is_some() || self.settings.pacing.is_disabled() {
                continue;
            }
            let delay = self.settings.pacing.next_delay();
            if let Err(reason) = self.interruptible(sleep(delay), deadline).await {
                break reason;
            }
        };

        let elapsed = started.elapsed();
        info!(
            %stop_reason,
            attempted = state.attempted,
            discovered = state.items.len(),
            misses = state.misses,
            blocked = state.blocked,
            transient = state.transient,
            cursor = %state.cursor,
            elapsed_ms = elapsed.as_millis() as u64,
            "Scan stopped"
        );
        if state.blocked > 0 {
            warn!(blocked = state.blocked, "Some probes were blocked; the site may be rejecting this client");
        }

        Ok(FinishedScan {
            previous_cursor,
            state,
            stop_reason,
            elapsed,
        })
    }

    #[instrument(level = "info", skip_all, fields(discovered = finished.state.items.len()))]
    fn finish<E: FeedEmitter>(&self, finished: FinishedScan, emitter: &E) -> CrawlResult<ScanReport> {
        let mut report = finished.report(false);
        if finished.state.items.is_empty() {
            info!("No new articles; cursor and feed left untouched");
            return Ok(report);
        }

        let cursor = finished.state.cursor;
        // Emit first: if the feed cannot be written the cursor stays put and the
        // next run rediscovers the same articles.
        emitter.emit(finished.state.items)?;
        if cursor > finished.previous_cursor {
            self.store.save(cursor)?;
        }
        report.persisted = true;
        Ok(report)
    }

    fn limit_reached(&self, state: &RunState) -> Option<StopReason> {
        if state.attempted >= self.settings.per_run_attempt_ceiling {
            Some(StopReason::AttemptCeiling)
        } else if state.consecutive_misses >= self.settings.consecutive_miss_threshold {
            Some(StopReason::MissThreshold)
        } else {
            None
        }
    }

    fn interrupted(&self, deadline: Option<Instant>) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            Some(StopReason::Cancelled)
        } else if deadline.is_some_and(|at| Instant::now() >= at) {
            Some(StopReason::Deadline)
        } else {
            None
        }
    }

    /// Drive `fut` unless cancellation or the deadline comes first.
    async fn interruptible<T>(
        &self,
        fut: impl Future<Output = T>,
        deadline: Option<Instant>,
    ) -> Result<T, StopReason> {
        let expiry = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StopReason::Cancelled),
            _ = expiry => Err(StopReason::Deadline),
            value = fut => Ok(value),
        }
    }
}
