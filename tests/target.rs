// tests/target.rs

mod common;
use crate::common::{TestResult, init_tracing};

use std::fs;
use std::io::Write;

use tempfile::tempdir;

use batchdag::dag::Target;
use batchdag::errors::BatchdagError;

#[test]
fn write_payload_creates_marker_with_payload() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let target = Target::new("A", dir.path().join("nested/A_success"));

    assert!(!target.exists());
    target.write_payload("AzureBatch-Pool-Id-17")?;

    assert!(target.exists());
    assert_eq!(target.read()?, "AzureBatch-Pool-Id-17");
    Ok(())
}

#[test]
fn second_write_is_rejected_and_keeps_first_payload() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let target = Target::new("A", dir.path().join("A_success"));

    target.write_payload("first")?;
    let err = target.write_payload("second").unwrap_err();

    assert!(matches!(err, BatchdagError::AlreadyExists(_)), "got {err:?}");
    assert_eq!(target.read()?, "first");
    Ok(())
}

#[test]
fn dropped_writer_leaves_no_marker_and_no_temp_file() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let target = Target::new("A", dir.path().join("A_success"));

    {
        let mut writer = target.open_for_write()?;
        writer.write_all(b"half a payl")?;
        // Dropped without commit.
    }

    assert!(!target.exists());
    let leftovers: Vec<_> = fs::read_dir(dir.path())?.collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    Ok(())
}

#[test]
fn racing_writers_only_one_commit_wins() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let target = Target::new("A", dir.path().join("A_success"));

    let mut first = target.open_for_write()?;
    let mut second = target.open_for_write()?;
    first.write_all(b"first")?;
    second.write_all(b"second")?;

    first.commit()?;
    let err = second.commit().unwrap_err();

    assert!(matches!(err, BatchdagError::AlreadyExists(_)), "got {err:?}");
    assert_eq!(target.read()?, "first");
    Ok(())
}

#[test]
fn remove_reports_whether_marker_existed() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let target = Target::new("A", dir.path().join("A_success"));

    assert!(!target.remove()?);
    target.write_payload("x")?;
    assert!(target.remove()?);
    assert!(!target.exists());
    Ok(())
}

#[test]
fn directory_at_marker_path_is_not_complete() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("A_success");
    fs::create_dir(&path)?;

    let target = Target::new("A", path);
    assert!(!target.exists());
    Ok(())
}
