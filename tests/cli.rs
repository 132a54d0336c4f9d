//! CLI surface checks against the real binary.
//!
//! The shipped binary carries no registered modules, so these tests cover
//! the surfaces that do not need any: help, version, and the empty-run
//! exit code.

use assert_cmd::Command;
use predicates::prelude::*;

fn testrules() -> Command {
    Command::cargo_bin("testrules").expect("binary builds")
}

#[test]
fn test_help_token_prints_usage_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    testrules()
        .current_dir(dir.path())
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("USAGE:"));
}

#[test]
fn test_help_flag_reaches_the_same_help_block() {
    let dir = tempfile::tempdir().unwrap();
    testrules()
        .current_dir(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run both linting and all tests"));
}

#[test]
fn test_version_flag() {
    testrules()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("testrules"));
}

#[test]
fn test_empty_directory_run_fails_with_no_test_files() {
    let dir = tempfile::tempdir().unwrap();
    testrules()
        .current_dir(dir.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("No test files found!"));
}

#[test]
fn test_unknown_token_is_treated_as_missing_module() {
    let dir = tempfile::tempdir().unwrap();
    testrules()
        .current_dir(dir.path())
        .arg("customtype")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("No test files found!"));
}

#[test]
fn test_lint_without_backend_reports_failure_but_exits_zero() {
    // A missing lint backend renders the distinct "failed" message; only
    // a positive violation count fails the lint command.
    let dir = tempfile::tempdir().unwrap();
    testrules()
        .current_dir(dir.path())
        .arg("lint")
        .assert()
        .success()
        .stdout(predicate::str::contains("Linting failed due to an error"));
}
