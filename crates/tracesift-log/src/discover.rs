//! Session file discovery under a sessions directory

use crate::error::{LogError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Include/exclude globs and a cap applied to discovered session files
///
/// Globs match the path relative to the sessions directory.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_sessions: Option<usize>,
}

impl SessionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| LogError::invalid_glob(pattern, e.to_string()))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| LogError::invalid_glob(patterns.join(","), e.to_string()))?;
    Ok(Some(set))
}

/// Find `*.jsonl` session files below `dir`, sorted and capped
pub fn discover_sessions(dir: &Path, filter: &SessionFilter) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(LogError::SessionsDirNotFound(dir.display().to_string()));
    }

    let include = build_globset(&filter.include)?;
    let exclude = build_globset(&filter.exclude)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {e}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }

        let rel = path.strip_prefix(dir).unwrap_or(path);
        if let Some(set) = &include {
            if !set.is_match(rel) {
                continue;
            }
        }
        if let Some(set) = &exclude {
            if set.is_match(rel) {
                continue;
            }
        }
        found.push(path.to_path_buf());
    }

    found.sort();
    if let Some(max) = filter.max_sessions {
        found.truncate(max);
    }

    tracing::debug!(dir = %dir.display(), count = found.len(), "discovered session files");
    Ok(found)
}

/// Path of `path` relative to `dir`, with `/` separators
pub fn relative_hint(dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(dir).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Default location of agent session logs (`~/.claude/projects`)
pub fn default_sessions_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join("projects"))
}
