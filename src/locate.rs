//! Region locator: finds the line range holding the toolchain definitions.
//!
//! The file has no schema, so the range is found with layered heuristics.
//! Each tier is a bounded single-pass scan and is exposed on its own so it
//! can be exercised in isolation; [`locate_region`] composes them.

use crate::block::BLOCK_HEADER;
use crate::dialect::{is_block_terminator, is_prefix_declaration, CXX_COMPILER_ID_MARKER, SIZE_MARKER};
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, warn};

/// Lines after the anchor searched for the end of the toolchain block.
pub const END_SCAN_WINDOW: usize = 15;
/// Lines from the anchor searched for the size tool declaration.
pub const SIZE_SCAN_WINDOW: usize = 10;
/// Lines after the anchor replaced along with it when no end marker is found.
pub const DEFAULT_BLOCK_SPAN: usize = 7;

/// Half-open line range `[start, end)` slated for replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Where the region's first line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StartSource {
    /// The prefix declaration itself.
    Anchor,
    /// The line after the last `CMAKE_CXX_COMPILER_ID` setting before the anchor.
    CompilerIdentifier { line: usize },
    /// The header of a block emitted by an earlier run.
    ExistingBlock { line: usize },
}

/// Which tier settled the region's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EndTier {
    /// A substantive comment, executable-suffix or try-compile setting.
    SectionMarker { line: usize },
    /// The `CMAKE_SIZE` declaration, replaced along with the block.
    SizeDeclaration { line: usize },
    /// Nothing matched; the anchor and a fixed span after it.
    DefaultWindow,
    /// End of a block emitted by an earlier run, closing blank line included.
    ExistingBlock { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    pub region: Region,
    /// Index of the `set(TOOLCHAIN_PREFIX ...)` line.
    pub anchor: usize,
    pub start_source: StartSource,
    pub end_tier: EndTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a NotFound result means the document must not be modified"]
pub enum Located {
    Found(RegionReport),
    NotFound,
}

impl Located {
    pub fn region(&self) -> Option<Region> {
        match self {
            Located::Found(report) => Some(report.region),
            Located::NotFound => None,
        }
    }
}

/// Locate the toolchain block in `lines`.
///
/// Returns [`Located::NotFound`] when there is no prefix declaration; no
/// fallback guesses a region in that case.
pub fn locate_region<S: AsRef<str>>(lines: &[S]) -> Located {
    let Some(anchor) = find_anchor(lines) else {
        debug!("no TOOLCHAIN_PREFIX declaration found");
        return Located::NotFound;
    };
    debug!(line = anchor + 1, "found TOOLCHAIN_PREFIX declaration");

    let start_source = find_start(lines, anchor);
    let start = match start_source {
        StartSource::Anchor => anchor,
        StartSource::CompilerIdentifier { line } => line + 1,
        StartSource::ExistingBlock { line } => line,
    };

    let existing_end = match start_source {
        StartSource::ExistingBlock { .. } => find_existing_block_end(lines, anchor),
        _ => None,
    };
    let (end, end_tier) = existing_end.unwrap_or_else(|| find_block_end(lines, anchor));
    let region = Region {
        start,
        end: end.max(start),
    };
    debug!(
        start = region.start + 1,
        end = region.end,
        ?start_source,
        ?end_tier,
        "located toolchain region"
    );

    Located::Found(RegionReport {
        region,
        anchor,
        start_source,
        end_tier,
    })
}

/// Index of the first `set(TOOLCHAIN_PREFIX ...)` line.
pub fn find_anchor<S: AsRef<str>>(lines: &[S]) -> Option<usize> {
    lines.iter().position(|line| is_prefix_declaration(line.as_ref()))
}

/// Decide where the replaced range begins.
///
/// Toolchain identification settings usually sit ahead of the path settings,
/// so everything up to the last `CMAKE_CXX_COMPILER_ID` line before the anchor
/// is kept. A block header from an earlier run after that point wins, so
/// repeated runs replace the old block instead of stacking a new one on it.
pub fn find_start<S: AsRef<str>>(lines: &[S], anchor: usize) -> StartSource {
    let compiler_id = lines[..anchor]
        .iter()
        .rposition(|line| line.as_ref().contains(CXX_COMPILER_ID_MARKER));
    let boundary = compiler_id.map_or(0, |line| line + 1);

    let existing = lines[boundary..anchor]
        .iter()
        .position(|line| line.as_ref().trim() == BLOCK_HEADER)
        .map(|offset| boundary + offset);

    match (existing, compiler_id) {
        (Some(line), _) => StartSource::ExistingBlock { line },
        (None, Some(line)) => StartSource::CompilerIdentifier { line },
        (None, None) => StartSource::Anchor,
    }
}

/// Exclusive end of the toolchain block, and the tier that produced it.
pub fn find_block_end<S: AsRef<str>>(lines: &[S], anchor: usize) -> (usize, EndTier) {
    if let Some(line) = scan_section_marker(lines, anchor) {
        return (line, EndTier::SectionMarker { line });
    }
    if let Some(line) = scan_size_declaration(lines, anchor) {
        return (line + 1, EndTier::SizeDeclaration { line });
    }
    let end = (anchor + DEFAULT_BLOCK_SPAN + 1).min(lines.len());
    warn!(
        line = anchor + 1,
        "no end marker or CMAKE_SIZE near TOOLCHAIN_PREFIX, replacing {} lines after it",
        DEFAULT_BLOCK_SPAN
    );
    (end, EndTier::DefaultWindow)
}

/// Exclusive end of a previously emitted block: past its `CMAKE_SIZE` line
/// and the blank line after it.
pub fn find_existing_block_end<S: AsRef<str>>(
    lines: &[S],
    anchor: usize,
) -> Option<(usize, EndTier)> {
    let window = anchor..(anchor + END_SCAN_WINDOW).min(lines.len());
    let size = window.into_iter().find(|&i| lines[i].as_ref().contains(SIZE_MARKER))?;
    let mut end = size + 1;
    if lines.get(end).is_some_and(|line| line.as_ref().trim().is_empty()) {
        end += 1;
    }
    Some((end, EndTier::ExistingBlock { line: size }))
}

/// First terminator line within [`END_SCAN_WINDOW`] lines after the anchor.
pub fn scan_section_marker<S: AsRef<str>>(lines: &[S], anchor: usize) -> Option<usize> {
    let window = (anchor + 1)..(anchor + END_SCAN_WINDOW).min(lines.len());
    window.into_iter().find(|&i| is_block_terminator(lines[i].as_ref()))
}

/// The `CMAKE_SIZE` line within [`SIZE_SCAN_WINDOW`] lines from the anchor.
pub fn scan_size_declaration<S: AsRef<str>>(lines: &[S], anchor: usize) -> Option<usize> {
    let window = anchor..(anchor + SIZE_SCAN_WINDOW).min(lines.len());
    window.into_iter().find(|&i| lines[i].as_ref().contains(SIZE_MARKER))
}
