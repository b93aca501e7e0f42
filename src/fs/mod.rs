// src/fs/mod.rs

//! Filesystem helpers that keep re-runs from touching unchanged files.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::trace;

/// Create `path` and its parents if missing. Returns `true` if it was created.
pub fn ensure_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))?;
    Ok(true)
}

/// Write `contents` to `path` unless it already holds exactly that.
///
/// Returns `true` when the file was (re)written.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == contents => {
            trace!(path = %path.display(), "content unchanged; not writing");
            return Ok(false);
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("reading file {:?}", path)),
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("writing to file {:?}", path))?;
    Ok(true)
}

/// Read a file that may not exist yet.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading file {:?}", path)),
    }
}
