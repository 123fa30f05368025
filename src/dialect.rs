//! Line shapes of the CubeMX-style `arm-none-eabi` CMake toolchain file.
//!
//! Every heuristic in the crate classifies single lines through the
//! predicates in this module, so detection, region location and tail
//! filtering agree on what a "prefix declaration" or a "section start" is.

use once_cell::sync::Lazy;
use regex::Regex;

/// Toolchain name fragment every target file mentions.
pub const TOOLCHAIN_FRAGMENT: &str = "arm-none-eabi-";

pub const SYSTEM_NAME_MARKER: &str = "CMAKE_SYSTEM_NAME";
pub const SYSTEM_PROCESSOR_MARKER: &str = "CMAKE_SYSTEM_PROCESSOR";
pub const C_COMPILER_MARKER: &str = "CMAKE_C_COMPILER";
pub const ASM_COMPILER_MARKER: &str = "CMAKE_ASM_COMPILER";
pub const PREFIX_MARKER: &str = "TOOLCHAIN_PREFIX";
pub const CXX_COMPILER_ID_MARKER: &str = "CMAKE_CXX_COMPILER_ID";
pub const EXECUTABLE_SUFFIX_MARKER: &str = "CMAKE_EXECUTABLE_SUFFIX";
pub const TRY_COMPILE_MARKER: &str = "CMAKE_TRY_COMPILE_TARGET_TYPE";
pub const SIZE_MARKER: &str = "CMAKE_SIZE";

/// Advisory comment CubeMX emits next to a PATH-relative prefix.
const PATH_ADVISORY_DETECT: &str = "must be part of path environment";
const PATH_ADVISORY_DROP: &str = "must be part of path";

static FIXED_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"set\s*\(\s*TOOLCHAIN_PREFIX\s+arm-none-eabi-\s*\)").expect("valid regex")
});

static PREFIX_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)set\s*\(\s*TOOLCHAIN_PREFIX\b").expect("valid regex"));

static COMPILER_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)set\s*\(\s*CMAKE_(C|CXX|ASM)_COMPILER\b").expect("valid regex"));

static TOOL_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)set\s*\(\s*CMAKE_(LINKER|OBJCOPY|SIZE)\b").expect("valid regex"));

/// `set(TOOLCHAIN_PREFIX arm-none-eabi-)`, the PATH-relying form.
pub fn has_fixed_prefix_declaration(text: &str) -> bool {
    FIXED_PREFIX_RE.is_match(text)
}

/// Any `set(TOOLCHAIN_PREFIX ...)` line, whatever its value.
pub fn is_prefix_declaration(line: &str) -> bool {
    PREFIX_DECL_RE.is_match(line)
}

/// Lines the replacement block makes obsolete wherever they appear.
pub fn is_superseded_declaration(line: &str) -> bool {
    PREFIX_DECL_RE.is_match(line) || COMPILER_DECL_RE.is_match(line) || TOOL_DECL_RE.is_match(line)
}

/// Whether the text carries the "must be part of path environment" note.
pub fn mentions_path_advisory(text: &str) -> bool {
    text.to_lowercase().contains(PATH_ADVISORY_DETECT)
}

/// Legacy advisory line dropped from the preserved tail.
pub fn is_path_advisory(line: &str) -> bool {
    line.to_lowercase().contains(PATH_ADVISORY_DROP)
}

/// A comment carrying more than the bare `#`.
pub fn is_substantive_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('#') && trimmed.len() > 1
}

/// First line of the section that follows the toolchain block.
pub fn is_section_start(line: &str) -> bool {
    is_substantive_comment(line) || line.contains(EXECUTABLE_SUFFIX_MARKER)
}

/// Settings that end the toolchain block when scanning forward.
pub fn is_block_terminator(line: &str) -> bool {
    is_substantive_comment(line)
        || line.contains(EXECUTABLE_SUFFIX_MARKER)
        || line.contains(TRY_COMPILE_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_prefix_tolerates_whitespace() {
        assert!(has_fixed_prefix_declaration("set(TOOLCHAIN_PREFIX arm-none-eabi-)"));
        assert!(has_fixed_prefix_declaration(
            "set ( TOOLCHAIN_PREFIX                arm-none-eabi- )"
        ));
        assert!(!has_fixed_prefix_declaration(
            "set(TOOLCHAIN_PREFIX ${TOOLCHAIN_DIR}/bin/arm-none-eabi-)"
        ));
    }

    #[test]
    fn prefix_declaration_is_case_insensitive() {
        assert!(is_prefix_declaration("SET(toolchain_prefix foo)"));
        assert!(is_prefix_declaration("    set(TOOLCHAIN_PREFIX ${X}/bin/arm-none-eabi-)"));
        assert!(!is_prefix_declaration("# TOOLCHAIN_PREFIX is set below"));
    }

    #[test]
    fn superseded_covers_compilers_and_tools() {
        for line in [
            "set(CMAKE_C_COMPILER ${TOOLCHAIN_PREFIX}gcc)",
            "set(CMAKE_CXX_COMPILER ${TOOLCHAIN_PREFIX}g++)",
            "set(CMAKE_ASM_COMPILER ${CMAKE_C_COMPILER})",
            "set(CMAKE_LINKER ${TOOLCHAIN_PREFIX}g++)",
            "set(CMAKE_OBJCOPY ${TOOLCHAIN_PREFIX}objcopy)",
            "set(CMAKE_SIZE ${TOOLCHAIN_PREFIX}size)",
        ] {
            assert!(is_superseded_declaration(line), "{line}");
        }
        assert!(!is_superseded_declaration("set(CMAKE_EXECUTABLE_SUFFIX_C \".elf\")"));
        assert!(!is_superseded_declaration("set(CMAKE_C_FLAGS \"${MCU}\")"));
        assert!(!is_superseded_declaration("set(CMAKE_CXX_COMPILER_ID GNU)"));
        assert!(!is_superseded_declaration("set(CMAKE_LINKER_TYPE LLD)"));
    }

    #[test]
    fn comment_classification() {
        assert!(is_substantive_comment("# MCU specific flags\n"));
        assert!(is_substantive_comment("   #x"));
        assert!(!is_substantive_comment("#\n"));
        assert!(!is_substantive_comment("set(X 1) # trailing"));
    }

    #[test]
    fn advisory_phrases() {
        assert!(mentions_path_advisory("# arm-none-eabi- MUST be part of path environment"));
        assert!(is_path_advisory("# arm-none-eabi- must be part of path environment\n"));
        assert!(!is_path_advisory("# MCU specific flags"));
    }

    #[test]
    fn block_terminators() {
        assert!(is_block_terminator("set(CMAKE_TRY_COMPILE_TARGET_TYPE STATIC_LIBRARY)"));
        assert!(is_block_terminator("set(CMAKE_EXECUTABLE_SUFFIX_ASM \".elf\")"));
        assert!(!is_section_start("set(CMAKE_TRY_COMPILE_TARGET_TYPE STATIC_LIBRARY)"));
    }
}
