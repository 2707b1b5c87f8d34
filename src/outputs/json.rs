//! JSON archive of published feed entries.
//!
//! The archive is a JSON array of [`FeedEntry`] records, newest first. It is
//! the feed's memory: each emitting run merges its new entries into it and
//! renders the RSS document from the result. A missing archive starts empty;
//! a corrupt one is logged and replaced on the next write.

use super::FeedError;
use crate::models::FeedEntry;
use crate::utils::write_atomic;
use std::io;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Read the archive at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_archive(path: &Path) -> Vec<FeedEntry> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No feed archive yet");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = %e, "Feed archive unreadable; starting a fresh one");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<FeedEntry>>(&text) {
        Ok(entries) => {
            debug!(count = entries.len(), "Loaded feed archive");
            entries
        }
        Err(e) => {
            warn!(error = %e, "Feed archive corrupt; starting a fresh one");
            Vec::new()
        }
    }
}

/// Replace the archive at `path` with `entries`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = entries.len()))]
pub fn write_archive(entries: &[FeedEntry], path: &Path) -> Result<(), FeedError> {
    let json = serde_json::to_vec_pretty(entries)?;
    write_atomic(path, &json)?;
    info!("Wrote feed archive");
    Ok(())
}
