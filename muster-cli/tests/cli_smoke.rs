//! Binary smoke tests for the `muster` wiring binary.
//!
//! `assert_cmd` against the real compiled binary: exercise the
//! config-resolution and exit code contract without needing Docker or
//! Kubernetes available.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn muster() -> Command {
    Command::cargo_bin("muster").unwrap()
}

#[test]
fn binary_exists() {
    muster();
}

#[test]
fn version_flag_prints_version_and_exits_zero() {
    muster()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("muster"));
}

#[test]
fn unknown_tracker_kind_in_config_file_is_exit_code_one() {
    let state_dir = TempDir::new().unwrap();
    std::fs::write(state_dir.path().join("config"), "tracker_kind=made_up\n").unwrap();

    muster()
        .arg("--state-dir")
        .arg(state_dir.path())
        .arg("--once")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn jira_tracker_without_url_is_a_fatal_config_error() {
    let state_dir = TempDir::new().unwrap();
    std::fs::write(state_dir.path().join("config"), "tracker_kind=jira\n").unwrap();

    muster()
        .arg("--state-dir")
        .arg(state_dir.path())
        .arg("--once")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn file_tracker_and_file_spawner_once_tick_succeeds_on_empty_queue() {
    let state_dir = TempDir::new().unwrap();
    std::fs::write(
        state_dir.path().join("config"),
        "tracker_kind=file\nspawner_kind=file\n",
    )
    .unwrap();

    muster()
        .arg("--state-dir")
        .arg(state_dir.path())
        .arg("--once")
        .assert()
        .success()
        .stdout(predicate::str::contains("muster orchestrator"));
}
