//! Utility functions for string truncation and file system operations.
//!
//! This module provides helpers used throughout the application:
//! - String truncation for log previews and feed descriptions
//! - Atomic file replacement for the cursor, archive and feed files
//! - Writability checks for output locations at startup

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` characters with an ellipsis and a byte
/// count indicator appended. Cuts always land on a character boundary, so
/// multi-byte text is safe.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Replace the file at `path` with `contents` atomically.
///
/// The data is written to a temp file in the same directory, flushed to disk,
/// then renamed over the target. Readers see either the old or the new file,
/// never a partial write. Missing parent directories are created.
#[instrument(level = "debug", skip(contents), fields(path = %path.display(), bytes = contents.len()))]
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!("Replaced file atomically");
    Ok(())
}

/// Ensure the directory that will hold `path` exists and is writable.
///
/// Creates the directory if needed, then probes it with a throwaway temp file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn ensure_writable_parent(path: &Path) -> io::Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;
    NamedTempFile::new_in(dir)?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
