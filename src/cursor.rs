//! Persistence of the crawl cursor between runs.
//!
//! The cursor is stored as a single decimal integer in a plain text file.
//! Reads are forgiving: a missing or corrupt file yields the configured
//! starting cursor so the crawl heals itself. Writes go through a temp file
//! and an atomic rename, so a crash mid-write leaves the previous value intact.

use crate::models::Cursor;
use crate::utils::write_atomic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("failed to persist cursor {cursor} to {path}: {source}")]
    Write {
        path: PathBuf,
        cursor: Cursor,
        #[source]
        source: io::Error,
    },
}

/// Storage for the crawl cursor.
pub trait CursorStore {
    /// Return the persisted cursor, or the configured default when none is usable.
    fn load(&self) -> Cursor;

    /// Durably persist `cursor`.
    fn save(&self, cursor: Cursor) -> Result<(), CursorError>;
}

/// [`CursorStore`] backed by a plain text file.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
    default: Cursor,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>, default: Cursor) -> Self {
        Self {
            path: path.into(),
            default,
        }
    }
}

impl CursorStore for FileCursorStore {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    fn load(&self) -> Cursor {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(default = %self.default, "No cursor file yet; starting from default");
                return self.default;
            }
            Err(e) => {
                warn!(error = %e, default = %self.default, "Cursor file unreadable; falling back to default");
                return self.default;
            }
        };

        match text.trim().parse::<u64>() {
            Ok(raw) => {
                debug!(cursor = raw, "Loaded cursor");
                Cursor::new(raw)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    content = %crate::utils::truncate_for_log(text.trim(), 64),
                    default = %self.default,
                    "Cursor file corrupt; falling back to default"
                );
                self.default
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), %cursor))]
    fn save(&self, cursor: Cursor) -> Result<(), CursorError> {
        write_atomic(&self.path, format!("{cursor}\n").as_bytes()).map_err(|source| {
            CursorError::Write {
                path: self.path.clone(),
                cursor,
                source,
            }
        })?;
        info!("Saved cursor");
        Ok(())
    }
}
