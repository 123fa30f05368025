//! Whole-document classification: is this a target toolchain file, and does
//! it already carry the environment-driven resolution block.

use crate::dialect::{
    has_fixed_prefix_declaration, mentions_path_advisory, ASM_COMPILER_MARKER, C_COMPILER_MARKER,
    PREFIX_MARKER, SYSTEM_NAME_MARKER, SYSTEM_PROCESSOR_MARKER, TOOLCHAIN_FRAGMENT,
};

/// Returns true when `text` looks like a CubeMX `arm-none-eabi` toolchain file.
///
/// The system name, system processor and toolchain fragment must all be
/// present, plus at least one of: the PATH-relying `set(TOOLCHAIN_PREFIX
/// arm-none-eabi-)` form, the "must be part of path environment" advisory, or
/// the C compiler, assembler and prefix declarations together.
pub fn is_target_dialect(text: &str) -> bool {
    let has_core_markers = text.contains(SYSTEM_NAME_MARKER)
        && text.contains(SYSTEM_PROCESSOR_MARKER)
        && text.contains(TOOLCHAIN_FRAGMENT);
    if !has_core_markers {
        return false;
    }

    has_fixed_prefix_declaration(text)
        || mentions_path_advisory(text)
        || (text.contains(C_COMPILER_MARKER)
            && text.contains(ASM_COMPILER_MARKER)
            && text.contains(PREFIX_MARKER))
}

/// Returns true when `text` already references `marker`, the environment
/// variable the replacement block resolves the toolchain directory from.
pub fn already_fixed(text: &str, marker: &str) -> bool {
    !marker.is_empty() && text.contains(marker)
}
