//! Per-file pipeline: read, gate, locate, splice, snapshot, write.
//!
//! Interactive decisions are delegated to a [`Confirm`] policy so the
//! pipeline runs unchanged under a terminal, a `--yes` flag or a test.

use crate::backup::{self, BackupError, Snapshot};
use crate::block::ReplacementBlock;
use crate::config::ResolutionConfig;
use crate::detect::{already_fixed, is_target_dialect};
use crate::edit::{Rewrite, RewriteError, RewriteResult};
use crate::locate::{locate_region, Located, RegionReport};
use crate::splice::{plan_fix, FixPlan};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// A yes/no decision the pipeline needs from its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    /// The file does not look like a target toolchain file; patch anyway?
    NotTargetDialect { file: PathBuf },
    /// The file already carries the resolution block; patch again?
    AlreadyFixed { file: PathBuf },
    /// The toolchain environment variable is unset; continue?
    MissingEnvironment { var: String },
    /// The file is missing; restore it from its newest snapshot?
    RestoreSnapshot { file: PathBuf, snapshot: PathBuf },
    /// Nothing found with the usual patterns; search more widely?
    WidenSearch { root: PathBuf },
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Question::NotTargetDialect { file } => write!(
                f,
                "{} may not be a CubeMX toolchain file. Fix it anyway?",
                file.display()
            ),
            Question::AlreadyFixed { file } => {
                write!(f, "{} appears to be fixed already. Fix it again?", file.display())
            }
            Question::MissingEnvironment { var } => {
                write!(f, "{var} is not set. Continue fixing toolchain files?")
            }
            Question::RestoreSnapshot { file, snapshot } => write!(
                f,
                "Restore {} from {}?",
                file.display(),
                snapshot.display()
            ),
            Question::WidenSearch { root } => {
                write!(f, "Search {} for other toolchain files?", root.display())
            }
        }
    }
}

/// Policy answering [`Question`]s.
pub trait Confirm {
    fn confirm(&mut self, question: &Question) -> bool;
}

/// Answers every question with yes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _question: &Question) -> bool {
        true
    }
}

/// Answers every question with no.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&mut self, _question: &Question) -> bool {
        false
    }
}

impl<F> Confirm for F
where
    F: FnMut(&Question) -> bool,
{
    fn confirm(&mut self, question: &Question) -> bool {
        self(question)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NotTargetDialect,
    AlreadyFixed,
    /// Patching would not change a byte.
    NoChange,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotTargetDialect => write!(f, "not a CubeMX toolchain file"),
            SkipReason::AlreadyFixed => write!(f, "already fixed"),
            SkipReason::NoChange => write!(f, "nothing to change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FixOutcome should be reported"]
pub enum FixOutcome {
    /// `overridden` lists the skip reasons the caller chose to proceed past.
    Fixed {
        file: PathBuf,
        snapshot: Snapshot,
        plan: FixPlan,
        overridden: Vec<SkipReason>,
    },
    /// Dry run: the plan that would have been written.
    WouldFix {
        file: PathBuf,
        plan: FixPlan,
        overridden: Vec<SkipReason>,
    },
    Skipped { file: PathBuf, reason: SkipReason },
}

impl FixOutcome {
    pub fn file(&self) -> &Path {
        match self {
            FixOutcome::Fixed { file, .. }
            | FixOutcome::WouldFix { file, .. }
            | FixOutcome::Skipped { file, .. } => file,
        }
    }
}

#[derive(Error, Debug)]
pub enum FixError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("no TOOLCHAIN_PREFIX definition in {file}; file left untouched")]
    RegionNotFound { file: PathBuf },

    #[error("failed to back up {file}; file left untouched: {source}")]
    Backup { file: PathBuf, source: BackupError },

    #[error("failed to write {file} (snapshot kept at {snapshot}): {source}")]
    Write {
        file: PathBuf,
        snapshot: PathBuf,
        source: RewriteError,
    },
}

/// Read-only classification of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub file: PathBuf,
    pub target_dialect: bool,
    pub already_fixed: bool,
    pub region: Option<RegionReport>,
}

/// Outcome of the missing-file recovery flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    NoSnapshots,
    Declined { snapshots: Vec<Snapshot> },
    Restored { snapshot: Snapshot },
}

/// Applies the resolution block to toolchain files.
#[derive(Debug, Clone)]
pub struct Fixer {
    block: ReplacementBlock,
    marker: String,
    dry_run: bool,
}

impl Fixer {
    pub fn new(policy: &ResolutionConfig) -> Self {
        Self {
            block: ReplacementBlock::new(policy),
            marker: policy.env_var.clone(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn block(&self) -> &ReplacementBlock {
        &self.block
    }

    /// Fix one file.
    ///
    /// The new content is fully assembled before anything is written, and a
    /// snapshot is taken right before the write. The file is either fully
    /// rewritten or left as it was.
    pub fn fix_file(&self, file: &Path, confirm: &mut dyn Confirm) -> Result<FixOutcome, FixError> {
        let text = read_text(file)?;
        let mut overridden = Vec::new();

        if !is_target_dialect(&text) {
            let question = Question::NotTargetDialect {
                file: file.to_path_buf(),
            };
            if !confirm.confirm(&question) {
                debug!(file = %file.display(), "file does not look like a CubeMX toolchain file");
                return Ok(skipped(file, SkipReason::NotTargetDialect));
            }
            warn!(file = %file.display(), "file does not look like a CubeMX toolchain file, patching anyway");
            overridden.push(SkipReason::NotTargetDialect);
        }

        if already_fixed(&text, &self.marker) {
            let question = Question::AlreadyFixed {
                file: file.to_path_buf(),
            };
            if !confirm.confirm(&question) {
                debug!(file = %file.display(), marker = %self.marker, "resolution marker present");
                return Ok(skipped(file, SkipReason::AlreadyFixed));
            }
            warn!(file = %file.display(), marker = %self.marker, "resolution marker present, patching again");
            overridden.push(SkipReason::AlreadyFixed);
        }

        let plan = plan_fix(&text, &self.block).map_err(|_| FixError::RegionNotFound {
            file: file.to_path_buf(),
        })?;
        info!(
            file = %file.display(),
            start = plan.region.region.start + 1,
            end = plan.region.region.end,
            dropped = plan.splice.dropped,
            "planned toolchain block replacement"
        );

        if plan.is_noop() {
            return Ok(skipped(file, SkipReason::NoChange));
        }

        if self.dry_run {
            return Ok(FixOutcome::WouldFix {
                file: file.to_path_buf(),
                plan,
                overridden,
            });
        }

        let snapshot = backup::backup(file).map_err(|source| FixError::Backup {
            file: file.to_path_buf(),
            source,
        })?;

        let rewrite = Rewrite::new(file, &plan.original, plan.patched.as_str());
        match rewrite.apply() {
            Ok(RewriteResult::Written { bytes, .. }) => {
                info!(file = %file.display(), bytes, "toolchain file rewritten");
            }
            Ok(RewriteResult::Unchanged { .. }) => {
                debug!(file = %file.display(), "file already held the patched content");
            }
            Err(source) => {
                return Err(FixError::Write {
                    file: file.to_path_buf(),
                    snapshot: snapshot.path,
                    source,
                })
            }
        }

        Ok(FixOutcome::Fixed {
            file: file.to_path_buf(),
            snapshot,
            plan,
            overridden,
        })
    }

    /// Fix every file in order, each at most once (by canonical path).
    ///
    /// A failing file does not stop the batch.
    pub fn fix_batch(
        &self,
        files: &[PathBuf],
        confirm: &mut dyn Confirm,
    ) -> Vec<(PathBuf, Result<FixOutcome, FixError>)> {
        let mut processed = HashSet::new();
        let mut results = Vec::with_capacity(files.len());

        for file in files {
            let key = file.canonicalize().unwrap_or_else(|_| file.clone());
            if !processed.insert(key) {
                debug!(file = %file.display(), "skipping duplicate path");
                continue;
            }
            results.push((file.clone(), self.fix_file(file, confirm)));
        }

        results
    }

    /// Classify `file` without modifying it.
    pub fn inspect(&self, file: &Path) -> Result<Inspection, FixError> {
        let text = read_text(file)?;
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let region = match locate_region(&lines) {
            Located::Found(report) => Some(report),
            Located::NotFound => None,
        };
        Ok(Inspection {
            file: file.to_path_buf(),
            target_dialect: is_target_dialect(&text),
            already_fixed: already_fixed(&text, &self.marker),
            region,
        })
    }
}

/// Offer to restore a missing `file` from its newest snapshot.
pub fn recover_missing(file: &Path, confirm: &mut dyn Confirm) -> Result<Recovery, BackupError> {
    let snapshots = backup::list_snapshots(file)?;
    let Some(latest) = snapshots.last().cloned() else {
        return Ok(Recovery::NoSnapshots);
    };

    let question = Question::RestoreSnapshot {
        file: file.to_path_buf(),
        snapshot: latest.path.clone(),
    };
    if !confirm.confirm(&question) {
        return Ok(Recovery::Declined { snapshots });
    }

    backup::restore(file, &latest.path)?;
    Ok(Recovery::Restored { snapshot: latest })
}

fn read_text(file: &Path) -> Result<String, FixError> {
    fs::read_to_string(file).map_err(|source| FixError::Read {
        file: file.to_path_buf(),
        source,
    })
}

fn skipped(file: &Path, reason: SkipReason) -> FixOutcome {
    info!(file = %file.display(), %reason, "skipping file");
    FixOutcome::Skipped {
        file: file.to_path_buf(),
        reason,
    }
}
