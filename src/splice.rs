//! Content splicer: builds the patched document from the original lines, a
//! located region and the replacement block.
//!
//! Output is `prefix + block + tail`. The tail runs through [`TailFilter`],
//! which drops superseded toolchain declarations until the next section
//! begins and passes everything through from there on.

use crate::block::{LineEnding, ReplacementBlock};
use crate::dialect::{is_path_advisory, is_section_start, is_superseded_declaration};
use crate::locate::{locate_region, Located, Region, RegionReport};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no TOOLCHAIN_PREFIX declaration found; not a recognizable toolchain file")]
pub struct RegionNotFound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailState {
    /// Dropping superseded declarations and advisories.
    Filtering,
    /// Next section reached; everything is kept.
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailAction {
    Keep,
    Drop,
}

/// Two-state filter over the lines following the region.
///
/// The only transition is `Filtering -> Passthrough`, taken on the first
/// section line that is not itself a legacy advisory.
#[derive(Debug)]
pub struct TailFilter {
    state: TailState,
    dropped: usize,
    next_section: Option<usize>,
}

impl TailFilter {
    pub fn new() -> Self {
        Self {
            state: TailState::Filtering,
            dropped: 0,
            next_section: None,
        }
    }

    /// Classify the line at document index `index`.
    pub fn feed(&mut self, index: usize, line: &str) -> TailAction {
        match self.state {
            TailState::Passthrough => TailAction::Keep,
            TailState::Filtering => {
                if is_superseded_declaration(line) || is_path_advisory(line) {
                    self.dropped += 1;
                    TailAction::Drop
                } else {
                    if is_section_start(line) {
                        self.state = TailState::Passthrough;
                        self.next_section = Some(index);
                    }
                    TailAction::Keep
                }
            }
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.state == TailState::Passthrough
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn next_section(&self) -> Option<usize> {
        self.next_section
    }
}

impl Default for TailFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// What the splice did, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpliceReport {
    /// Lines inside the region that were replaced.
    pub replaced: usize,
    /// Tail lines dropped as superseded or advisory.
    pub dropped: usize,
    /// Lines of the replacement block inserted.
    pub inserted: usize,
    /// Index of the line where the tail switched to passthrough.
    pub next_section: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spliced {
    pub lines: Vec<String>,
    pub report: SpliceReport,
}

impl Spliced {
    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

/// Replace `region` of `lines` with `replacement`, filtering the tail.
///
/// `lines` keep their terminators; `replacement` lines must carry theirs.
pub fn splice<S: AsRef<str>>(lines: &[S], region: Region, replacement: &[String]) -> Spliced {
    let start = region.start.min(lines.len());
    let end = region.end.clamp(start, lines.len());

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + replacement.len());
    out.extend(lines[..start].iter().map(|line| line.as_ref().to_string()));
    out.extend(replacement.iter().cloned());

    let mut filter = TailFilter::new();
    for (index, line) in lines.iter().enumerate().skip(end) {
        let line = line.as_ref();
        if filter.feed(index, line) == TailAction::Keep {
            out.push(line.to_string());
        }
    }

    match filter.next_section() {
        Some(index) => debug!(
            line = index + 1,
            dropped = filter.dropped(),
            "next section found, keeping remaining lines"
        ),
        None => warn!(
            dropped = filter.dropped(),
            "no next section marker found; filtered toolchain lines to end of file"
        ),
    }

    Spliced {
        lines: out,
        report: SpliceReport {
            replaced: end - start,
            dropped: filter.dropped(),
            inserted: replacement.len(),
            next_section: filter.next_section(),
        },
    }
}

/// Fully assembled in-memory result of patching one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixPlan {
    pub original: String,
    pub patched: String,
    pub region: RegionReport,
    pub splice: SpliceReport,
}

impl FixPlan {
    /// True when the patched text equals the original.
    pub fn is_noop(&self) -> bool {
        self.original == self.patched
    }
}

/// Locate and splice `text` without touching the filesystem.
pub fn plan_fix(text: &str, block: &ReplacementBlock) -> Result<FixPlan, RegionNotFound> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let report = match locate_region(&lines) {
        Located::Found(report) => report,
        Located::NotFound => return Err(RegionNotFound),
    };

    let replacement = block.terminated(LineEnding::detect(text));
    let spliced = splice(&lines, report.region, &replacement);

    Ok(FixPlan {
        original: text.to_string(),
        patched: spliced.text(),
        region: report,
        splice: spliced.report,
    })
}
