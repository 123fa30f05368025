use crate::config::schema::{PatcherConfig, ValidationError};
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "TOOLCHAIN_PATCHER_CONFIG";
/// Config file picked up from the search root when present.
pub const CONFIG_FILE_NAME: &str = "toolchain-patcher.toml";

/// Where a config document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Inline,
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Inline => f.write_str("inline config"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("{origin} is not a valid patcher config: {source}")]
    Toml {
        origin: ConfigSource,
        source: toml_edit::de::Error,
    },

    #[error("invalid config in {origin}: {source}")]
    Validation {
        origin: ConfigSource,
        source: ValidationError,
    },
}

fn parse(input: &str, origin: ConfigSource) -> Result<PatcherConfig, ConfigError> {
    let config: PatcherConfig = match toml_edit::de::from_str(input) {
        Ok(config) => config,
        Err(source) => return Err(ConfigError::Toml { origin, source }),
    };
    match config.validate() {
        Ok(()) => Ok(config),
        Err(source) => Err(ConfigError::Validation { origin, source }),
    }
}

pub fn load_from_str(input: &str) -> Result<PatcherConfig, ConfigError> {
    parse(input, ConfigSource::Inline)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatcherConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, ConfigSource::File(path.to_path_buf()))
}

/// Resolve the effective configuration.
///
/// Priority order:
/// 1. Explicit path
/// 2. `TOOLCHAIN_PATCHER_CONFIG` environment variable
/// 3. `toolchain-patcher.toml` in the search root
/// 4. Built-in defaults
pub fn resolve(explicit: Option<&Path>, root: &Path) -> Result<PatcherConfig, ConfigError> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading config from --config");
        return load_from_path(path);
    }

    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(path);
        debug!(path = %path.display(), "loading config from TOOLCHAIN_PATCHER_CONFIG");
        return load_from_path(&path);
    }

    let local = root.join(CONFIG_FILE_NAME);
    if local.is_file() {
        debug!(path = %local.display(), "loading config from search root");
        return load_from_path(&local);
    }

    Ok(PatcherConfig::default())
}
