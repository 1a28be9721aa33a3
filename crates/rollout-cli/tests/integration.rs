use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn rollout() -> Command {
    Command::cargo_bin("rollout").unwrap()
}

fn write_manifest(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("manifest.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

const HAPPY_PATH: &str = r#"
properties:
  install_dir: /opt/app
actions:
  - id: read_config
    body:
      type: log
      message: reading existing config
    anchor:
      after: cost_finalize
  - id: write_config
    body:
      type: log
      message: writing config
    context: deferred
    inputs: [install_dir]
    anchor:
      after: install_files
  - id: write_config_rollback
    body:
      type: log
      message: removing config
    context: rollback
    compensates: write_config
    anchor:
      before: write_config
"#;

// ---------------------------------------------------------------------------
// rollout checkpoints
// ---------------------------------------------------------------------------

#[test]
fn checkpoints_lists_install_skeleton() {
    rollout()
        .arg("checkpoints")
        .assert()
        .success()
        .stdout(predicate::str::contains("install_initialize"))
        .stdout(predicate::str::contains("install_finalize"))
        .stdout(predicate::str::contains("make-changes boundary"));
}

#[test]
fn checkpoints_ui_sequence_stops_before_boundary() {
    rollout()
        .args(["checkpoints", "--sequence", "ui"])
        .assert()
        .success()
        .stdout(predicate::str::contains("install_validate"))
        .stdout(predicate::str::contains("install_files").not());
}

#[test]
fn checkpoints_unknown_sequence_fails() {
    rollout()
        .args(["checkpoints", "--sequence", "admin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("admin"));
}

// ---------------------------------------------------------------------------
// rollout plan
// ---------------------------------------------------------------------------

#[test]
fn plan_places_actions_at_their_anchors() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, HAPPY_PATH);

    let output = rollout()
        .args(["plan", manifest.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let names: Vec<&str> = parsed["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();

    let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(pos("cost_finalize") < pos("read_config"));
    assert!(pos("install_files") < pos("write_config_rollback"));
    assert_eq!(pos("write_config"), pos("write_config_rollback") + 1);
}

#[test]
fn plan_json_output() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, HAPPY_PATH);

    let output = rollout()
        .args(["plan", manifest.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["sequence"], "install");
    assert!(parsed["entries"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["name"] == "write_config" && e["context"] == "deferred"));
}

#[test]
fn plan_rejects_unresolved_anchor() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
actions:
  - id: orphan
    body:
      type: log
      message: hello
    anchor:
      after: no_such_action
"#,
    );

    rollout()
        .args(["plan", manifest.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no_such_action"));
}

#[test]
fn plan_rejects_deferred_action_outside_make_changes_region() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
actions:
  - id: too_early
    body:
      type: log
      message: hello
    context: deferred
    anchor:
      after: app_search
"#,
    );

    rollout()
        .args(["plan", manifest.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("too_early"));
}

// ---------------------------------------------------------------------------
// rollout run
// ---------------------------------------------------------------------------

#[test]
fn run_completes_and_reports_outcome() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, HAPPY_PATH);

    rollout()
        .args(["run", manifest.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome: completed"));
}

#[test]
fn run_json_report_includes_record() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, HAPPY_PATH);

    let output = rollout()
        .args(["run", manifest.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["outcome"], "completed");
    let record = parsed["record"]["entries"].as_array().unwrap();
    assert!(record
        .iter()
        .any(|e| e["action"] == "write_config" && e["status"] == "succeeded"));
}

#[test]
fn run_failure_rolls_back_and_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
actions:
  - id: stage_files
    body:
      type: log
      message: staging
    context: deferred
    anchor:
      after: install_files
  - id: stage_files_rollback
    body:
      type: log
      message: unstaging
    context: rollback
    compensates: stage_files
    anchor:
      before: stage_files
  - id: start_service
    body:
      type: fail
      reason: service refused to start
    context: deferred
    anchor:
      after: install_services
"#,
    );

    let assert = rollout()
        .args(["run", manifest.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session rolled back"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("outcome: rolled_back"));
    assert!(stdout.contains("compensated"));
}

#[test]
fn run_condition_skips_by_intent() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
actions:
  - id: remove_data
    body:
      type: log
      message: removing data
    context: deferred
    condition:
      type: flag
      flag: uninstalling
    anchor:
      before: remove_files
"#,
    );

    rollout()
        .args(["run", manifest.to_str().unwrap(), "--intent", "uninstalling"])
        .assert()
        .success()
        .stdout(predicate::str::contains("succeeded"));

    rollout()
        .args(["run", manifest.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));
}

#[test]
fn run_set_overrides_manifest_property() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
properties:
  port: "8125"
actions:
  - id: record_port
    body:
      type: set_property
      name: resolved_port
      value: done
    anchor:
      after: cost_finalize
"#,
    );

    rollout()
        .args([
            "run",
            manifest.to_str().unwrap(),
            "--set",
            "port=9999",
            "--json",
        ])
        .assert()
        .success();
}

#[test]
fn run_missing_manifest_reports_error() {
    rollout()
        .args(["run", "/no/such/manifest.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read manifest"));
}

#[test]
fn run_duplicate_action_id_rejected() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
actions:
  - id: twice
    body:
      type: log
      message: one
    anchor:
      after: app_search
  - id: twice
    body:
      type: log
      message: two
    anchor:
      after: app_search
"#,
    );

    rollout()
        .args(["run", manifest.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("twice"));
}
