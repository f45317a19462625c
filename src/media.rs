//! Media reference resolution against the media directory
//!
//! References address files by their case-folded filename stem. The directory
//! is re-listed on every lookup so files copied in at runtime become playable
//! without a restart.

use crate::config::MediaOptions;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves normalized media references to playable file paths
pub struct MediaLibrary {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl MediaLibrary {
    /// Create a library over the configured media directory.
    pub fn new(options: &MediaOptions) -> Self {
        Self {
            dir: options.dir.clone(),
            extensions: options
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// The directory this library resolves against.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a normalized (lower-cased) reference to a file path.
    ///
    /// Returns [`Error::MediaNotFound`] when no file with a supported
    /// extension matches the reference's stem.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::MediaNotFound(format!(
                "{reference} (media directory {} unreadable: {e})",
                self.dir.display()
            ))
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.supported(&path) {
                continue;
            }
            let stem_matches = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem.to_lowercase() == reference);
            if stem_matches {
                return Ok(path);
            }
        }

        Err(Error::MediaNotFound(reference.to_string()))
    }

    fn supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.contains(&e))
    }
}
