use super::{cubemx_project, CUBEMX};
use std::fs;
use tempfile::TempDir;
use toolchain_patcher::backup::list_snapshots;
use toolchain_patcher::{
    is_target_dialect, locate_region, plan_fix, AssumeNo, AssumeYes, EndTier, FixError,
    FixOutcome, Fixer, LineEnding, Located, Region, ReplacementBlock, ResolutionConfig,
    SkipReason, StartSource,
};

fn lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

#[test]
fn cubemx_file_gets_resolution_block() {
    let block = ReplacementBlock::default();
    let plan = plan_fix(CUBEMX, &block).unwrap();

    assert_eq!(plan.region.region, Region { start: 5, end: 17 });
    assert_eq!(
        plan.region.start_source,
        StartSource::CompilerIdentifier { line: 4 }
    );

    let original = lines(CUBEMX);
    let mut expected = original[..5].concat();
    expected.push_str(&block.terminated(LineEnding::Lf).concat());
    expected.push_str(&original[17..].concat());
    assert_eq!(plan.patched, expected);

    // Settings after the toolchain block survive untouched
    assert!(plan.patched.contains("set(CMAKE_TRY_COMPILE_TARGET_TYPE STATIC_LIBRARY)\n"));
    assert!(plan.patched.contains("# MCU specific flags\n"));
    assert!(plan
        .patched
        .ends_with("-Wl,--start-group -lstdc++ -lsupc++ -Wl,--end-group\")\n"));
    assert!(!plan.patched.contains("must be part of path"));
}

#[test]
fn fix_writes_file_and_snapshot() {
    let dir = TempDir::new().unwrap();
    let file = cubemx_project(dir.path(), CUBEMX);

    let outcome = Fixer::new(&ResolutionConfig::default())
        .fix_file(&file, &mut AssumeNo)
        .unwrap();

    let FixOutcome::Fixed { snapshot, plan, .. } = outcome else {
        panic!("expected Fixed, got {outcome:?}");
    };
    assert_eq!(fs::read_to_string(&snapshot.path).unwrap(), CUBEMX);
    assert_eq!(fs::read_to_string(&file).unwrap(), plan.patched);
    assert_eq!(list_snapshots(&file).unwrap().len(), 1);
}

#[test]
fn second_run_is_skipped_or_a_no_op() {
    let dir = TempDir::new().unwrap();
    let file = cubemx_project(dir.path(), CUBEMX);
    let fixer = Fixer::new(&ResolutionConfig::default());

    let first = fixer.fix_file(&file, &mut AssumeNo).unwrap();
    assert!(matches!(first, FixOutcome::Fixed { .. }));
    let patched = fs::read_to_string(&file).unwrap();

    // Declining the "fix again" question skips the file
    let declined = fixer.fix_file(&file, &mut AssumeNo).unwrap();
    assert!(matches!(
        declined,
        FixOutcome::Skipped {
            reason: SkipReason::AlreadyFixed,
            ..
        }
    ));

    // Accepting it replaces the old block with an identical one
    let accepted = fixer.fix_file(&file, &mut AssumeYes).unwrap();
    assert!(matches!(
        accepted,
        FixOutcome::Skipped {
            reason: SkipReason::NoChange,
            ..
        }
    ));

    assert_eq!(fs::read_to_string(&file).unwrap(), patched);
    assert_eq!(list_snapshots(&file).unwrap().len(), 1);
}

#[test]
fn refix_replaces_existing_block() {
    let block = ReplacementBlock::default();
    let once = plan_fix(CUBEMX, &block).unwrap().patched;
    let twice = plan_fix(&once, &block).unwrap();

    assert!(matches!(
        twice.region.start_source,
        StartSource::ExistingBlock { .. }
    ));
    assert_eq!(twice.patched, once);
    assert_eq!(once.matches("if(DEFINED ENV{ARM_TOOLCHAIN_PATH})").count(), 1);
}

#[test]
fn forty_line_file_ends_after_size_declaration() {
    let mut doc: Vec<String> = (0..40).map(|i| format!("set(OPTION_{i} ON)\n")).collect();
    doc[12] = "set(TOOLCHAIN_PREFIX arm-none-eabi-)\n".to_string();
    doc[13] = "set(CMAKE_C_COMPILER ${TOOLCHAIN_PREFIX}gcc)\n".to_string();
    doc[18] = "set(CMAKE_SIZE ${TOOLCHAIN_PREFIX}size)\n".to_string();
    doc[27] = "# Linker settings\n".to_string();
    let text = doc.concat();

    let Located::Found(report) = locate_region(&lines(&text)) else {
        panic!("expected a region");
    };
    assert_eq!(report.region, Region { start: 12, end: 19 });
    assert_eq!(report.end_tier, EndTier::SizeDeclaration { line: 18 });
    assert_eq!(report.start_source, StartSource::Anchor);

    let block = ReplacementBlock::default();
    let plan = plan_fix(&text, &block).unwrap();
    let mut expected = doc[..12].concat();
    expected.push_str(&block.terminated(LineEnding::Lf).concat());
    expected.push_str(&doc[19..].concat());
    assert_eq!(plan.patched, expected);
    assert_eq!(plan.splice.replaced, 7);
    assert_eq!(plan.splice.dropped, 0);
    assert_eq!(plan.splice.next_section, Some(27));
}

#[test]
fn crlf_file_stays_crlf() {
    let text = CUBEMX.replace('\n', "\r\n");
    let plan = plan_fix(&text, &ReplacementBlock::default()).unwrap();

    assert!(!plan.patched.replace("\r\n", "").contains('\n'));
    assert!(plan.patched.contains("if(DEFINED ENV{ARM_TOOLCHAIN_PATH})\r\n"));
}

#[test]
fn custom_variable_flows_into_block() {
    let policy = ResolutionConfig {
        env_var: "GCC_ARM_HOME".to_string(),
        relative_dir: "tools/gcc".to_string(),
        ..ResolutionConfig::default()
    };
    let plan = plan_fix(CUBEMX, &ReplacementBlock::new(&policy)).unwrap();

    assert!(plan.patched.contains("if(DEFINED ENV{GCC_ARM_HOME})"));
    assert!(plan.patched.contains("${CMAKE_CURRENT_LIST_DIR}/tools/gcc"));
    assert!(!plan.patched.contains("ARM_TOOLCHAIN_PATH"));
}

#[test]
fn unrelated_cmake_file_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let text = "set(CMAKE_SYSTEM_NAME Linux)\nset(CMAKE_SYSTEM_PROCESSOR x86_64)\nset(CMAKE_C_COMPILER gcc)\n";
    let file = cubemx_project(dir.path(), text);
    assert!(!is_target_dialect(text));

    let outcome = Fixer::new(&ResolutionConfig::default())
        .fix_file(&file, &mut AssumeNo)
        .unwrap();
    assert!(matches!(
        outcome,
        FixOutcome::Skipped {
            reason: SkipReason::NotTargetDialect,
            ..
        }
    ));
    assert_eq!(fs::read_to_string(&file).unwrap(), text);
}

#[test]
fn batch_keeps_going_after_failure() {
    let dir = TempDir::new().unwrap();
    let good = cubemx_project(dir.path(), CUBEMX);
    let bad = dir.path().join("broken.cmake");
    fs::write(&bad, "set(CMAKE_SYSTEM_NAME Generic)\n").unwrap();

    let results = Fixer::new(&ResolutionConfig::default())
        .fix_batch(&[bad.clone(), good.clone()], &mut AssumeYes);

    assert_eq!(results.len(), 2);
    assert!(matches!(results[0].1, Err(FixError::RegionNotFound { .. })));
    assert!(matches!(results[1].1, Ok(FixOutcome::Fixed { .. })));
    assert_eq!(
        fs::read_to_string(&bad).unwrap(),
        "set(CMAKE_SYSTEM_NAME Generic)\n"
    );
}

#[test]
fn inspection_reports_state() {
    let dir = TempDir::new().unwrap();
    let file = cubemx_project(dir.path(), CUBEMX);
    let fixer = Fixer::new(&ResolutionConfig::default());

    let before = fixer.inspect(&file).unwrap();
    assert!(before.target_dialect);
    assert!(!before.already_fixed);
    assert_eq!(before.region.unwrap().anchor, 8);

    let _ = fixer.fix_file(&file, &mut AssumeNo).unwrap();
    let after = fixer.inspect(&file).unwrap();
    assert!(after.already_fixed);
}
