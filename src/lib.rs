//! Toolchain Patcher: environment-driven toolchain paths for CubeMX CMake files
//!
//! STM32CubeMX generates a `gcc-arm-none-eabi.cmake` toolchain file that
//! expects `arm-none-eabi-gcc` on the system `PATH`. This crate rewrites the
//! toolchain block of such a file so the toolchain directory is resolved from
//! an environment variable, then from a bundled relative directory, then from
//! `PATH`, leaving every unrelated line untouched.
//!
//! # Architecture
//!
//! - [`detect`] classifies a document (target dialect, already fixed).
//! - [`locate`] finds the line region holding the toolchain definitions.
//! - [`splice`] assembles the patched document in memory.
//! - [`backup`] snapshots the file before it is written and restores it.
//! - [`fixer`] runs the per-file pipeline behind a [`Confirm`] policy.
//!
//! # Safety
//!
//! - Nothing is written unless a region was located
//! - A timestamped snapshot is taken before every write
//! - Atomic file writes (tempfile + fsync + rename)
//! - The on-disk content is re-verified before it is replaced
//! - Re-running on a fixed file replaces the block instead of stacking it
//!
//! # Example
//!
//! ```
//! use toolchain_patcher::{plan_fix, ReplacementBlock};
//!
//! let text = "\
//! set(CMAKE_SYSTEM_NAME Generic)
//! set(CMAKE_SYSTEM_PROCESSOR arm)
//! set(TOOLCHAIN_PREFIX arm-none-eabi-)
//! set(CMAKE_C_COMPILER ${TOOLCHAIN_PREFIX}gcc)
//! ## MCU specific flags
//! ";
//!
//! let plan = plan_fix(text, &ReplacementBlock::default()).unwrap();
//! assert!(plan.patched.contains("if(DEFINED ENV{ARM_TOOLCHAIN_PATH})"));
//! assert!(plan.patched.ends_with("# MCU specific flags\n"));
//! ```

pub mod backup;
pub mod block;
pub mod config;
pub mod detect;
pub mod dialect;
pub mod discover;
pub mod edit;
pub mod environment;
pub mod fixer;
pub mod locate;
pub mod splice;

// Re-exports
pub use backup::{backup, latest_snapshot, list_snapshots, restore, BackupError, Snapshot};
pub use block::{LineEnding, ReplacementBlock, BLOCK_HEADER};
pub use config::{ConfigError, PatcherConfig, ResolutionConfig};
pub use detect::{already_fixed, is_target_dialect};
pub use environment::{check_environment, EnvironmentStatus};
pub use fixer::{
    recover_missing, AssumeNo, AssumeYes, Confirm, FixError, FixOutcome, Fixer, Inspection,
    Question, Recovery, SkipReason,
};
pub use locate::{locate_region, EndTier, Located, Region, RegionReport, StartSource};
pub use splice::{plan_fix, splice, FixPlan, RegionNotFound, SpliceReport, TailFilter};
