//! Attachment path resolution shared by the file-reading tools

use std::path::{Path, PathBuf};

use gaia_config::expand_home;

use super::ToolError;

/// Resolves model-supplied paths against the attachments directory
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    base_dir: Option<PathBuf>,
}

impl FileResolver {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Expand `~`, anchor relative paths at the base directory and require
    /// the file to exist. Bare file names that are missing under the base
    /// directory are retried relative to the working directory.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ToolError::InvalidArguments("empty file path".to_string()));
        }

        let expanded = expand_home(raw);
        let candidate = match &self.base_dir {
            Some(base) if expanded.is_relative() => base.join(&expanded),
            _ => expanded.clone(),
        };

        if candidate.exists() {
            return Ok(candidate);
        }
        if expanded.is_relative() && expanded.exists() {
            return Ok(expanded);
        }
        Err(ToolError::FileNotFound(candidate))
    }
}

/// Lowercase extension of `path`, if any
pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
