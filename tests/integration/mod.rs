//! Integration tests for the fix pipeline against on-disk toolchain files.

mod pipeline;
mod recovery;

use std::fs;
use std::path::{Path, PathBuf};

pub const CUBEMX: &str = include_str!("../fixtures/gcc-arm-none-eabi.cmake");

/// Lay out `cmake/gcc-arm-none-eabi.cmake` the way CubeMX does.
pub fn cubemx_project(root: &Path, content: &str) -> PathBuf {
    let dir = root.join("cmake");
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("gcc-arm-none-eabi.cmake");
    fs::write(&file, content).unwrap();
    file
}
