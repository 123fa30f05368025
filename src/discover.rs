//! Candidate discovery: find toolchain files under a search root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("invalid search pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// Files under `root` matching any of `patterns`, deduplicated by canonical
/// path in first-seen order.
pub fn find_candidates(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            pattern
        );
        let entries = glob::glob(&full).map_err(|source| DiscoveryError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        let mut matched: Vec<PathBuf> = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => matched.push(path),
                Err(e) => warn!(path = %e.path().display(), "skipping unreadable path: {}", e.error()),
            }
        }
        matched.sort();

        for path in matched {
            push_unique(&mut files, &mut seen, path);
        }
    }

    debug!(root = %root.display(), count = files.len(), "candidate discovery finished");
    Ok(files)
}

/// Every `*.cmake` file under `root` whose name mentions "toolchain".
pub fn find_wide(root: &Path) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    for entry in walker.filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name.ends_with(".cmake") && name.to_lowercase().contains("toolchain") {
            push_unique(&mut files, &mut seen, entry.into_path());
        }
    }

    files
}

fn push_unique(files: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: PathBuf) {
    if !path.is_file() {
        return;
    }
    let key = path.canonicalize().unwrap_or_else(|_| path.clone());
    if seen.insert(key) {
        files.push(path);
    }
}
