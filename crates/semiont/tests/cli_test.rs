#![allow(deprecated)]

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;

fn semiont(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("semiont").unwrap();
    cmd.current_dir(project.path())
        .env_remove("SEMIONT_ENV")
        .env_remove("SEMIONT_ROOT")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("semiont").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("configure"))
        .stdout(predicate::str::contains("--environment"));
}

#[test]
fn test_init_writes_project_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("semiont").unwrap();
    cmd.current_dir(dir.path())
        .args(["init", "--name", "demo", "--environments", "local,test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized project 'demo'"));

    assert!(dir.path().join("semiont.json").exists());
    assert!(dir.path().join("environments/local.json").exists());
    assert!(dir.path().join("environments/test.json").exists());
    assert!(!dir.path().join("environments/production.json").exists());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let project = TestProject::new();
    semiont(&project)
        .args(["init", "--environments", "test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_unknown_environment_lists_available() {
    let project = TestProject::new();
    semiont(&project)
        .args(["start", "-e", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Environment 'nowhere' not found"))
        .stderr(predicate::str::contains("Available environments: test"));
}

#[test]
fn test_start_json_envelope() {
    let project = TestProject::new();
    let output = semiont(&project)
        .args(["start", "-e", "test", "-o", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["command"], "start");
    assert_eq!(value["environment"], "test");
    assert_eq!(value["summary"]["total"], 3);
    assert_eq!(value["summary"]["failed"], 0);
    assert_eq!(value["results"][0]["entity"], "database");
    assert_eq!(value["results"][2]["entity"], "frontend");
}

#[test]
fn test_execution_context_uses_invocation_directory() {
    let project = TestProject::new();
    let subdir = project.path().join("environments");
    let output = semiont(&project)
        .current_dir(&subdir)
        .env("USER", "ci-runner")
        .args(["check", "-o", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let expected = std::fs::canonicalize(&subdir).unwrap();
    assert_eq!(
        value["executionContext"]["cwd"],
        expected.display().to_string()
    );
    assert_eq!(value["executionContext"]["user"], "ci-runner");
}

#[test]
fn test_quiet_table_still_prints() {
    let project = TestProject::new();
    semiont(&project)
        .args(["check", "-q", "-o", "table"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("SERVICE"));
}

#[test]
fn test_default_environment_from_project() {
    let project = TestProject::new();
    semiont(&project)
        .args(["check", "-o", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 total, 3 succeeded, 0 failed"));
}

#[test]
fn test_dry_run_marks_results() {
    let project = TestProject::new();
    semiont(&project)
        .args(["stop", "--dry-run", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dryRun\": true"));
}

#[test]
fn test_unknown_service() {
    let project = TestProject::new();
    semiont(&project)
        .args(["start", "-s", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown service 'nope'"))
        .stderr(predicate::str::contains("backend"));
}

#[test]
fn test_single_service_selection() {
    let project = TestProject::new();
    semiont(&project)
        .args(["start", "-s", "backend", "-o", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backend"))
        .stdout(predicate::str::contains("1 total, 1 succeeded, 0 failed"));
}

#[test]
fn test_exec_needs_single_service() {
    let project = TestProject::new();
    semiont(&project)
        .args(["exec", "--", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--service"));
}

#[test]
fn test_exec_on_mock() {
    let project = TestProject::new();
    semiont(&project)
        .args(["exec", "-s", "backend", "--", "echo", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mock: echo hi"));
}

#[test]
fn test_configure_show() {
    let project = TestProject::new();
    let output = semiont(&project)
        .args(["configure", "show", "-o", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["environment"], "test");
    assert_eq!(value["defaultPlatform"], "mock");
    assert_eq!(value["services"].as_array().unwrap().len(), 3);
}

#[test]
fn test_configure_missing_secret() {
    let project = TestProject::new();
    semiont(&project)
        .args(["configure", "get", "oauth/google"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Secret not found: oauth/google"));
}

#[test]
fn test_no_project_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("semiont").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("SEMIONT_ROOT")
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project root not found"));
}
