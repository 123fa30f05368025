use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// A whole-file rewrite guarded by a check of what is on disk.
///
/// The new content is assembled in memory first; the file is only replaced
/// if it still holds exactly the content the new text was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Rewrite does nothing until apply() is called"]
pub struct Rewrite {
    pub file: PathBuf,
    /// Verification of the content the rewrite was planned against
    pub expected_before: ContentVerification,
    pub new_content: String,
}

/// Verification strategy for the current file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected content (used above 1KB)
    Hash(u64),
}

impl ContentVerification {
    pub fn matches(&self, content: &[u8]) -> bool {
        match self {
            ContentVerification::ExactMatch(expected) => content == expected.as_bytes(),
            ContentVerification::Hash(expected_hash) => xxh3_64(content) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            ContentVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            ContentVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("{file} changed on disk since it was read; not overwriting")]
    ContentChanged { file: PathBuf },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RewriteResult should be checked for written/unchanged"]
pub enum RewriteResult {
    Written { file: PathBuf, bytes: usize },
    /// The file already holds the new content
    Unchanged { file: PathBuf },
}

impl Rewrite {
    pub fn new(file: impl Into<PathBuf>, original: &str, new_content: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            expected_before: ContentVerification::from_text(original),
            new_content: new_content.into(),
        }
    }

    /// Replace the file atomically.
    ///
    /// Uses tempfile + fsync + rename for crash safety. Permissions of the
    /// original file are carried over and the mtime is bumped so build tools
    /// notice the change.
    pub fn apply(&self) -> Result<RewriteResult, RewriteError> {
        let current = fs::read(&self.file)?;

        if current == self.new_content.as_bytes() {
            return Ok(RewriteResult::Unchanged {
                file: self.file.clone(),
            });
        }

        if !self.expected_before.matches(&current) {
            return Err(RewriteError::ContentChanged {
                file: self.file.clone(),
            });
        }

        atomic_write(&self.file, self.new_content.as_bytes())?;

        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&self.file, now)?;

        Ok(RewriteResult::Written {
            file: self.file.clone(),
            bytes: self.new_content.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or nothing changes.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<(), std::io::Error> {
    // Same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        }
    };

    let permissions = fs::metadata(path).ok().map(|meta| meta.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Some(permissions) = permissions {
        fs::set_permissions(temp.path(), permissions)?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_exact_match() {
        let verify = ContentVerification::ExactMatch("hello".to_string());
        assert!(verify.matches(b"hello"));
        assert!(!verify.matches(b"hell"));
    }

    #[test]
    fn verification_from_large_text_hashes() {
        let text = "x".repeat(2000);
        let verify = ContentVerification::from_text(&text);
        assert!(matches!(verify, ContentVerification::Hash(_)));
        assert!(verify.matches(text.as_bytes()));
        assert!(!verify.matches(b"y"));
    }

    #[test]
    fn rewrite_replaces_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("toolchain.cmake");
        fs::write(&file_path, "original\n").unwrap();

        let result = Rewrite::new(&file_path, "original\n", "patched\n").apply().unwrap();

        assert!(matches!(result, RewriteResult::Written { bytes: 8, .. }));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "patched\n");
    }

    #[test]
    fn rewrite_refuses_concurrent_change() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("toolchain.cmake");
        fs::write(&file_path, "edited elsewhere\n").unwrap();

        let result = Rewrite::new(&file_path, "original\n", "patched\n").apply();

        assert!(matches!(result, Err(RewriteError::ContentChanged { .. })));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "edited elsewhere\n");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("toolchain.cmake");
        fs::write(&file_path, "patched\n").unwrap();

        let result = Rewrite::new(&file_path, "original\n", "patched\n").apply().unwrap();
        assert!(matches!(result, RewriteResult::Unchanged { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn rewrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("toolchain.cmake");
        fs::write(&file_path, "original\n").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();

        Rewrite::new(&file_path, "original\n", "patched\n").apply().unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
