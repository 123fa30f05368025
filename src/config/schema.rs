use serde::{Deserialize, Serialize};
use std::fmt;

/// Default environment variable naming the toolchain installation.
pub const DEFAULT_ENV_VAR: &str = "ARM_TOOLCHAIN_PATH";
/// Default bundled toolchain location, relative to the toolchain file.
pub const DEFAULT_RELATIVE_DIR: &str = "../../toolchain";
pub const DEFAULT_TOOL_PREFIX: &str = "arm-none-eabi-";

pub const DEFAULT_PATTERNS: &[&str] = &[
    "**/gcc-arm-none-eabi.cmake",
    "**/arm-none-eabi.cmake",
    "**/gnu-arm-none-eabi.cmake",
    "cmake/**/*.cmake",
];

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PatcherConfig {
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl PatcherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let env_var = self.resolution.env_var.trim();
        if env_var.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "resolution.env_var",
            });
        } else if !is_identifier(env_var) {
            issues.push(ValidationIssue::InvalidValue {
                field: "resolution.env_var",
                message: format!("'{env_var}' is not a valid environment variable name"),
            });
        }

        if self.resolution.relative_dir.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "resolution.relative_dir",
            });
        }

        let prefix = self.resolution.tool_prefix.trim();
        if prefix.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "resolution.tool_prefix",
            });
        } else if prefix.contains(char::is_whitespace) {
            issues.push(ValidationIssue::InvalidValue {
                field: "resolution.tool_prefix",
                message: format!("'{prefix}' contains whitespace"),
            });
        }

        if self.discovery.patterns.is_empty() {
            issues.push(ValidationIssue::EmptyPatternList);
        }
        for pattern in &self.discovery.patterns {
            if let Err(e) = glob::Pattern::new(pattern) {
                issues.push(ValidationIssue::InvalidValue {
                    field: "discovery.patterns",
                    message: format!("'{pattern}': {e}"),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// How the emitted block resolves the toolchain directory.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Environment variable naming the toolchain directory. Also the marker
    /// that identifies an already-fixed file.
    #[serde(default = "default_env_var")]
    pub env_var: String,
    /// Fallback directory relative to the toolchain file.
    #[serde(default = "default_relative_dir")]
    pub relative_dir: String,
    #[serde(default = "default_tool_prefix")]
    pub tool_prefix: String,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            env_var: default_env_var(),
            relative_dir: default_relative_dir(),
            tool_prefix: default_tool_prefix(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Glob patterns, relative to the search root.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }
}

fn default_env_var() -> String {
    DEFAULT_ENV_VAR.to_string()
}

fn default_relative_dir() -> String {
    DEFAULT_RELATIVE_DIR.to_string()
}

fn default_tool_prefix() -> String {
    DEFAULT_TOOL_PREFIX.to_string()
}

fn default_patterns() -> Vec<String> {
    DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatternList,
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatternList => {
                write!(f, "discovery.patterns must list at least one pattern")
            }
            ValidationIssue::MissingField { field } => {
                write!(f, "missing or empty required field '{field}'")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}
