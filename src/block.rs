//! The replacement block: a fixed CMake snippet resolving the toolchain
//! directory from the environment, then a bundled relative path, then PATH.

use crate::config::ResolutionConfig;

/// First line of every emitted block. The region locator uses it to find a
/// block left by an earlier run.
pub const BLOCK_HEADER: &str =
    "# Toolchain path resolution (environment variable > relative path > system PATH)";

/// Column at which declaration values start, matching CubeMX output.
const VALUE_COLUMN: usize = 32;

/// Line terminator used when emitting the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// Pick the terminator the document predominantly uses.
    pub fn detect(text: &str) -> Self {
        let crlf = text.matches("\r\n").count();
        let lf = text.matches('\n').count();
        if crlf > 0 && crlf * 2 >= lf {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Rendered replacement block, independent of the document it goes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementBlock {
    lines: Vec<String>,
}

impl ReplacementBlock {
    pub fn new(policy: &ResolutionConfig) -> Self {
        let env = &policy.env_var;
        let prefix = &policy.tool_prefix;
        let relative = policy.relative_dir.trim_end_matches('/');
        let relative_path = format!("${{CMAKE_CURRENT_LIST_DIR}}/{relative}");

        let mut lines = vec![
            BLOCK_HEADER.to_string(),
            "# 1. Toolchain directory from the environment (preferred, global setup)".to_string(),
            format!("if(DEFINED ENV{{{env}}})"),
            format!("    set(TOOLCHAIN_DIR $ENV{{{env}}})"),
            "    message(STATUS \"Using toolchain from environment: ${TOOLCHAIN_DIR}\")".to_string(),
            format!("elseif(EXISTS \"{relative_path}\")"),
            "    # 2. Toolchain bundled next to the project".to_string(),
            format!("    get_filename_component(TOOLCHAIN_DIR \"{relative_path}\" ABSOLUTE)"),
            "    message(STATUS \"Using toolchain from relative path: ${TOOLCHAIN_DIR}\")"
                .to_string(),
            "else()".to_string(),
            "    # 3. Whatever the system PATH provides (may lack newlib)".to_string(),
            "    set(TOOLCHAIN_DIR \"\")".to_string(),
            format!(
                "    message(WARNING \"{env} environment variable not set and {relative} not found. Trying system PATH.\")"
            ),
            format!(
                "    message(WARNING \"If compilation fails, set {env} environment variable to point to ARM GNU Toolchain with newlib.\")"
            ),
            "endif()".to_string(),
            String::new(),
            "# Toolchain prefix".to_string(),
            "if(TOOLCHAIN_DIR)".to_string(),
            format!("    {}", declaration("TOOLCHAIN_PREFIX", &format!("${{TOOLCHAIN_DIR}}/bin/{prefix}"))),
            "else()".to_string(),
            format!("    {}", declaration("TOOLCHAIN_PREFIX", prefix)),
            "endif()".to_string(),
            String::new(),
        ];

        lines.extend([
            declaration("CMAKE_C_COMPILER", "${TOOLCHAIN_PREFIX}gcc"),
            declaration("CMAKE_ASM_COMPILER", "${CMAKE_C_COMPILER}"),
            declaration("CMAKE_CXX_COMPILER", "${TOOLCHAIN_PREFIX}g++"),
            declaration("CMAKE_LINKER", "${TOOLCHAIN_PREFIX}g++"),
            declaration("CMAKE_OBJCOPY", "${TOOLCHAIN_PREFIX}objcopy"),
            declaration("CMAKE_SIZE", "${TOOLCHAIN_PREFIX}size"),
            String::new(),
        ]);

        Self { lines }
    }

    /// Lines without terminators.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines terminated with `ending`, ready to splice.
    pub fn terminated(&self, ending: LineEnding) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| format!("{line}{}", ending.as_str()))
            .collect()
    }
}

impl Default for ReplacementBlock {
    fn default() -> Self {
        Self::new(&ResolutionConfig::default())
    }
}

fn declaration(name: &str, value: &str) -> String {
    format!("set({name:<width$}{value})", width = VALUE_COLUMN)
}
