//! Check whether the toolchain environment variable is usable on this machine.

use std::env;
use std::path::{Path, PathBuf};

/// Example install location shown when the variable is unset.
const SUGGESTED_INSTALL: &str = "toolchains/arm-gnu-toolchain-14.2.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentStatus {
    Unset,
    Set {
        dir: PathBuf,
        /// Whether `<dir>/bin/<prefix>gcc` exists.
        compiler_found: bool,
    },
}

/// Inspect `var` in the process environment.
pub fn check_environment(var: &str, tool_prefix: &str) -> EnvironmentStatus {
    match env::var_os(var).filter(|value| !value.is_empty()) {
        None => EnvironmentStatus::Unset,
        Some(value) => inspect_dir(Path::new(&value), tool_prefix),
    }
}

/// Status for an explicit toolchain directory.
pub fn inspect_dir(dir: &Path, tool_prefix: &str) -> EnvironmentStatus {
    EnvironmentStatus::Set {
        dir: dir.to_path_buf(),
        compiler_found: compiler_path(dir, tool_prefix).exists(),
    }
}

pub fn compiler_path(dir: &Path, tool_prefix: &str) -> PathBuf {
    dir.join("bin").join(format!("{tool_prefix}gcc"))
}

/// Shell line a user can paste to set `var`.
pub fn suggested_export(var: &str) -> String {
    let base = match home::home_dir() {
        Some(home) => home.join(SUGGESTED_INSTALL).display().to_string(),
        None => format!("$HOME/{SUGGESTED_INSTALL}"),
    };
    format!("export {var}=\"{base}\"")
}
