//! Timestamped snapshots of a file taken before it is rewritten.
//!
//! A snapshot of `dir/name` is `dir/name.backup.YYYYMMDD_HHMMSS`. Snapshots
//! taken within the same second get a `-01` .. `-99` suffix instead of
//! overwriting each other, which keeps lexicographic order equal to
//! creation order. Snapshots are never removed by this crate.

use crate::edit::atomic_write;
use chrono::{Local, NaiveDateTime, Timelike};
use filetime::FileTime;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

pub const BACKUP_MARKER: &str = ".backup.";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const MAX_SEQUENCE: u32 = 99;

/// A snapshot on disk. Orders oldest first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Snapshot {
    pub taken_at: NaiveDateTime,
    /// Same-second collision counter, 0 for the first snapshot of a second.
    pub sequence: u32,
    pub path: PathBuf,
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("{0} has no file name")]
    NoFileName(PathBuf),

    #[error("more than 99 snapshots of {path} taken at {stamp}")]
    Exhausted { path: PathBuf, stamp: String },

    #[error("snapshot {snapshot} does not match {file} after copying")]
    VerificationFailed { file: PathBuf, snapshot: PathBuf },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File name of the snapshot of `file_name` taken at `taken_at`.
pub fn snapshot_name(file_name: &str, taken_at: NaiveDateTime, sequence: u32) -> String {
    let stamp = taken_at.format(TIMESTAMP_FORMAT);
    if sequence == 0 {
        format!("{file_name}{BACKUP_MARKER}{stamp}")
    } else {
        format!("{file_name}{BACKUP_MARKER}{stamp}-{sequence:02}")
    }
}

/// Parse `candidate` as a snapshot name of `file_name`.
pub fn parse_snapshot_name(file_name: &str, candidate: &str) -> Option<(NaiveDateTime, u32)> {
    let suffix = candidate
        .strip_prefix(file_name)?
        .strip_prefix(BACKUP_MARKER)?;
    if suffix.len() < TIMESTAMP_LEN || !suffix.is_char_boundary(TIMESTAMP_LEN) {
        return None;
    }
    let (stamp, rest) = suffix.split_at(TIMESTAMP_LEN);
    let taken_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

    let sequence = match rest.strip_prefix('-') {
        None if rest.is_empty() => 0,
        Some(digits) if digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().ok()?
        }
        _ => return None,
    };
    Some((taken_at, sequence))
}

fn split_path(path: &Path) -> Result<(PathBuf, String), BackupError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| BackupError::NoFileName(path.to_path_buf()))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}

/// Snapshot `path` with the current local time.
pub fn backup(path: &Path) -> Result<Snapshot, BackupError> {
    let now = Local::now().naive_local();
    backup_at(path, now.with_nanosecond(0).unwrap_or(now))
}

/// Snapshot `path` as if taken at `taken_at`.
///
/// Copies bytes, permissions and timestamps into a temporary file next to
/// `path`, checks the copy's content hash against the source, then moves it
/// to the first free snapshot name. On any error the temporary copy is
/// removed and no snapshot name is taken.
pub fn backup_at(path: &Path, taken_at: NaiveDateTime) -> Result<Snapshot, BackupError> {
    let (dir, file_name) = split_path(path)?;
    let content = fs::read(path).map_err(io_error(path))?;
    let metadata = fs::metadata(path).map_err(io_error(path))?;

    let mut staged = NamedTempFile::new_in(&dir).map_err(io_error(&dir))?;
    let staged_path = staged.path().to_path_buf();

    staged.write_all(&content).map_err(io_error(&staged_path))?;
    staged.as_file().sync_all().map_err(io_error(&staged_path))?;
    fs::set_permissions(&staged_path, metadata.permissions()).map_err(io_error(&staged_path))?;
    filetime::set_file_times(
        &staged_path,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(io_error(&staged_path))?;

    verify_copy(path, &content, &staged_path)?;

    let (snapshot_path, sequence) = claim_name(staged, &dir, &file_name, taken_at)?;

    info!(file = %path.display(), snapshot = %snapshot_path.display(), "snapshot created");
    Ok(Snapshot {
        taken_at,
        sequence,
        path: snapshot_path,
    })
}

/// Move `staged` to the first free snapshot name for this second.
fn claim_name(
    mut staged: NamedTempFile,
    dir: &Path,
    file_name: &str,
    taken_at: NaiveDateTime,
) -> Result<(PathBuf, u32), BackupError> {
    for sequence in 0..=MAX_SEQUENCE {
        let candidate = dir.join(snapshot_name(file_name, taken_at, sequence));
        match staged.persist_noclobber(&candidate) {
            Ok(_) => return Ok((candidate, sequence)),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(snapshot = %candidate.display(), "snapshot name taken");
                staged = e.file;
            }
            Err(e) => return Err(io_error(&candidate)(e.error)),
        }
    }
    Err(BackupError::Exhausted {
        path: dir.join(file_name),
        stamp: taken_at.format(TIMESTAMP_FORMAT).to_string(),
    })
}

fn verify_copy(file: &Path, expected: &[u8], copy: &Path) -> Result<(), BackupError> {
    let written = fs::read(copy).map_err(io_error(copy))?;
    if xxh3_64(&written) != xxh3_64(expected) {
        return Err(BackupError::VerificationFailed {
            file: file.to_path_buf(),
            snapshot: copy.to_path_buf(),
        });
    }
    Ok(())
}

/// All snapshots of `path`, oldest first. `path` itself need not exist.
pub fn list_snapshots(path: &Path) -> Result<Vec<Snapshot>, BackupError> {
    let (dir, file_name) = split_path(path)?;
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| BackupError::Io {
            path: dir.clone(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some((taken_at, sequence)) = parse_snapshot_name(&file_name, name) {
            snapshots.push(Snapshot {
                taken_at,
                sequence,
                path: entry.path().to_path_buf(),
            });
        }
    }

    snapshots.sort();
    Ok(snapshots)
}

/// The newest snapshot of `path`, if any.
pub fn latest_snapshot(path: &Path) -> Result<Option<Snapshot>, BackupError> {
    Ok(list_snapshots(path)?.pop())
}

/// Copy `snapshot` back over `path`, atomically, keeping the snapshot's
/// permissions and timestamps.
pub fn restore(path: &Path, snapshot: &Path) -> Result<(), BackupError> {
    let content = fs::read(snapshot).map_err(io_error(snapshot))?;
    let metadata = fs::metadata(snapshot).map_err(io_error(snapshot))?;

    atomic_write(path, &content).map_err(io_error(path))?;
    fs::set_permissions(path, metadata.permissions()).map_err(io_error(path))?;
    filetime::set_file_times(
        path,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(io_error(path))?;

    verify_copy(snapshot, &content, path)?;
    info!(file = %path.display(), snapshot = %snapshot.display(), "restored from snapshot");
    Ok(())
}
