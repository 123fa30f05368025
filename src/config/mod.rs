pub mod loader;
pub mod schema;

pub use loader::{
    load_from_path, load_from_str, resolve, ConfigError, ConfigSource, CONFIG_ENV_VAR,
    CONFIG_FILE_NAME,
};
pub use schema::{
    DiscoveryConfig, PatcherConfig, ResolutionConfig, ValidationError, ValidationIssue,
    DEFAULT_ENV_VAR, DEFAULT_PATTERNS, DEFAULT_RELATIVE_DIR, DEFAULT_TOOL_PREFIX,
};
