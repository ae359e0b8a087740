// ABOUTME: Integration tests for the pirollout CLI commands.
// ABOUTME: Validates --help, init, phases, exit codes and dry-run plans.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn pirollout_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pirollout"))
}

fn local_project() -> tempfile::TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    pirollout_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--host", "local"])
        .assert()
        .success();
    temp_dir
}

#[test]
fn help_shows_commands() {
    pirollout_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run-all"))
        .stdout(predicate::str::contains("run-phase"))
        .stdout(predicate::str::contains("verify-only"))
        .stdout(predicate::str::contains("resume"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("pirollout.yml");

    pirollout_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .success();

    assert!(config_path.exists(), "pirollout.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("host: pi@raspberrypi.local"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("pirollout.yml");

    fs::write(&config_path, "existing: config").unwrap();

    pirollout_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn phases_prints_builtin_order_without_config() {
    let temp_dir = tempfile::tempdir().unwrap();

    pirollout_cmd()
        .current_dir(temp_dir.path())
        .arg("phases")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. foundation"))
        .stdout(predicate::str::contains("depends on: foundation"))
        .stdout(predicate::str::contains("5. gui"));
}

#[test]
fn run_all_without_config_is_a_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();

    pirollout_cmd()
        .current_dir(temp_dir.path())
        .arg("run-all")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn unknown_phase_is_a_config_error() {
    let project = local_project();

    pirollout_cmd()
        .current_dir(project.path())
        .args(["run-phase", "nonexistent", "--dry-run"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown phase: nonexistent"));
}

#[test]
fn dry_run_prints_plan_and_touches_nothing() {
    let project = local_project();

    pirollout_cmd()
        .current_dir(project.path())
        .args(["run-all", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. foundation"))
        .stdout(predicate::str::contains("$ cd ~/lucid && docker compose -f"))
        .stdout(predicate::str::contains("up -d"));

    assert!(!project.path().join(".pirollout/reports").exists());
}

#[test]
fn dry_run_json_emits_one_event_per_phase() {
    let project = local_project();

    let assert = pirollout_cmd()
        .current_dir(project.path())
        .args(["run-phase", "core", "--dry-run", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "plan");
    assert_eq!(events[0]["phase"], "core");
    assert_eq!(events[0]["depends_on"][0], "foundation");
}

#[test]
fn resume_with_malformed_run_id_is_rejected() {
    let project = local_project();

    pirollout_cmd()
        .current_dir(project.path())
        .args(["resume", "not-an-id"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("run id"));
}

#[test]
fn quiet_and_json_conflict() {
    pirollout_cmd()
        .args(["phases", "--quiet", "--json"])
        .assert()
        .failure();
}
