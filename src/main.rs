//! # Numbered News Feed
//!
//! Discovers newly published articles on a news site whose articles live at
//! sequential numeric URLs (`/news/{id}.html`) and republishes them as an RSS
//! feed.
//!
//! ## Usage
//!
//! ```sh
//! numbered_news_feed -c config.yaml
//! ```
//!
//! ## Architecture
//!
//! Each invocation is one resumable scan:
//! 1. **Resume**: load the cursor (the newest article confirmed so far)
//! 2. **Scan**: probe `cursor + 1`, `cursor + 2`, ... until the attempt
//!    ceiling, the consecutive-miss threshold, or the deadline
//! 3. **Emit**: extract title/description/date from each new article and
//!    rewrite the RSS feed, merged with the archive of earlier entries
//! 4. **Commit**: persist the new cursor
//!
//! A run that finds nothing changes nothing on disk.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod cursor;
mod decode;
mod error;
mod extract;
mod fetch;
mod models;
mod outputs;
mod scan;
mod utils;

use classify::Classifier;
use cli::Cli;
use config::Config;
use cursor::FileCursorStore;
use fetch::{ReqwestFetcher, RetryFetch};
use outputs::RssFeedEmitter;
use scan::{ScanEngine, ScanReport};
use utils::ensure_writable_parent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "numbered_news_feed starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Cannot start without a valid configuration");
            return Err(e.into());
        }
    };
    args.apply_overrides(&mut config);
    config.validate()?;

    // Fail before scanning if results could not be recorded.
    if !args.dry_run {
        for path in [&config.cursor_path, &config.feed.archive_path, &config.feed.output_path] {
            if let Err(e) = ensure_writable_parent(path) {
                error!(path = %path.display(), error = %e, "Output location is not writable");
                return Err(e.into());
            }
        }
    }

    let fetcher = RetryFetch::new(ReqwestFetcher::new(&config.fetch_settings())?, config.retry_policy());
    let store = FileCursorStore::new(&config.cursor_path, config.default_cursor());
    let classifier = Classifier::new(config.classifier_rules());
    let engine = ScanEngine::new(fetcher, store, classifier, config.scan_settings()?);

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current step");
            cancel.cancel();
        }
    });

    let report = if args.dry_run {
        engine.dry_run().await?
    } else {
        let emitter = RssFeedEmitter::new(config.feed_settings()?);
        match engine.run(&emitter).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Run failed; progress was not recorded");
                return Err(e.into());
            }
        }
    };

    log_report(&report);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn log_report(report: &ScanReport) {
    let first = report.discovered.first().map(|id| id.get());
    let last = report.discovered.last().map(|id| id.get());
    info!(
        stop_reason = %report.stop_reason,
        previous_cursor = %report.previous_cursor,
        cursor = %report.cursor,
        attempted = report.attempted,
        discovered = report.discovered.len(),
        ?first,
        ?last,
        misses = report.misses,
        blocked = report.blocked,
        transient = report.transient,
        persisted = report.persisted,
        scan_ms = report.elapsed.as_millis() as u64,
        "Run summary"
    );
}
