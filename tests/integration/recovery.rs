use super::{cubemx_project, CUBEMX};
use chrono::NaiveDate;
use std::fs;
use tempfile::TempDir;
use toolchain_patcher::backup::{backup_at, latest_snapshot, list_snapshots};
use toolchain_patcher::edit::{Rewrite, RewriteError};
use toolchain_patcher::{
    recover_missing, AssumeNo, AssumeYes, FixError, FixOutcome, Fixer, Question, Recovery,
    ResolutionConfig,
};

#[test]
fn deleted_file_is_restored_from_snapshot() {
    let dir = TempDir::new().unwrap();
    let file = cubemx_project(dir.path(), CUBEMX);

    let outcome = Fixer::new(&ResolutionConfig::default())
        .fix_file(&file, &mut AssumeNo)
        .unwrap();
    assert!(matches!(outcome, FixOutcome::Fixed { .. }));
    fs::remove_file(&file).unwrap();

    let recovery = recover_missing(&file, &mut AssumeYes).unwrap();
    assert!(matches!(recovery, Recovery::Restored { .. }));
    assert_eq!(fs::read_to_string(&file).unwrap(), CUBEMX);
}

#[test]
fn declined_recovery_lists_snapshots() {
    let dir = TempDir::new().unwrap();
    let file = cubemx_project(dir.path(), CUBEMX);
    let _ = Fixer::new(&ResolutionConfig::default())
        .fix_file(&file, &mut AssumeNo)
        .unwrap();
    fs::remove_file(&file).unwrap();

    match recover_missing(&file, &mut AssumeNo).unwrap() {
        Recovery::Declined { snapshots } => assert_eq!(snapshots.len(), 1),
        other => panic!("expected Declined, got {other:?}"),
    }
    assert!(!file.exists());
}

#[test]
fn newest_snapshot_is_offered() {
    let dir = TempDir::new().unwrap();
    let file = cubemx_project(dir.path(), "older\n");
    let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

    backup_at(&file, day.and_hms_opt(9, 0, 0).unwrap()).unwrap();
    fs::write(&file, "newer\n").unwrap();
    let newest = backup_at(&file, day.and_hms_opt(17, 30, 0).unwrap()).unwrap();
    fs::remove_file(&file).unwrap();

    assert_eq!(list_snapshots(&file).unwrap().len(), 2);
    assert_eq!(latest_snapshot(&file).unwrap().unwrap(), newest);

    let mut offered = None;
    let mut policy = |q: &toolchain_patcher::Question| {
        offered = Some(q.clone());
        true
    };
    recover_missing(&file, &mut policy).unwrap();

    assert_eq!(
        offered,
        Some(toolchain_patcher::Question::RestoreSnapshot {
            file: file.clone(),
            snapshot: newest.path.clone(),
        })
    );
    assert_eq!(fs::read_to_string(&file).unwrap(), "newer\n");
}

#[test]
fn rewrite_refuses_concurrently_modified_file() {
    let dir = TempDir::new().unwrap();
    let file = cubemx_project(dir.path(), CUBEMX);

    let rewrite = Rewrite::new(&file, CUBEMX, "patched\n");
    fs::write(&file, "edited by someone else\n").unwrap();

    let err = rewrite.apply().unwrap_err();
    assert!(matches!(err, RewriteError::ContentChanged { .. }));
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "edited by someone else\n"
    );
}

#[test]
fn failed_write_keeps_the_snapshot() {
    let dir = TempDir::new().unwrap();
    let text = format!("{CUBEMX}# toolchain dir comes from ARM_TOOLCHAIN_PATH\n");
    let file = cubemx_project(dir.path(), &text);

    let mut edit_while_asked = |q: &Question| {
        if let Question::AlreadyFixed { file } = q {
            fs::write(file, "edited elsewhere\n").unwrap();
        }
        true
    };
    let err = Fixer::new(&ResolutionConfig::default())
        .fix_file(&file, &mut edit_while_asked)
        .unwrap_err();

    let (snapshot, source) = match err {
        FixError::Write {
            snapshot, source, ..
        } => (snapshot, source),
        other => panic!("expected a write failure, got {other:?}"),
    };
    assert!(matches!(source, RewriteError::ContentChanged { .. }));
    assert!(snapshot.exists());
    assert_eq!(list_snapshots(&file).unwrap().len(), 1);
    assert_eq!(fs::read_to_string(&snapshot).unwrap(), "edited elsewhere\n");
    assert_eq!(fs::read_to_string(&file).unwrap(), "edited elsewhere\n");
}
