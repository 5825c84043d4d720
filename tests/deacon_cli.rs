use assert_cmd::Command;
use predicates::prelude::*;

fn gtd(town: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("gtd").unwrap();
    cmd.env("GASTOWN_ROOT", town);
    cmd
}

#[test]
fn health_check_requires_agent() {
    let mut cmd = Command::cargo_bin("gtd").unwrap();
    cmd.arg("health-check");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("required arguments were not provided"));
}

#[test]
fn health_check_rejects_unknown_agent_type() {
    let town = tempfile::tempdir().unwrap();
    let mut cmd = gtd(town.path());
    cmd.args(["health-check", "gastown/dogs/rex"]);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown agent type"));
}

#[test]
fn status_reports_running_by_default() {
    let town = tempfile::tempdir().unwrap();
    let mut cmd = gtd(town.path());
    cmd.arg("status");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("deacon: running"))
        .stdout(predicate::str::contains("last heartbeat: never"));
}

#[test]
fn pause_resume_flow() {
    let town = tempfile::tempdir().unwrap();

    gtd(town.path())
        .args(["pause", "--reason", "rig maintenance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deacon paused"));

    gtd(town.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("PAUSED"))
        .stdout(predicate::str::contains("rig maintenance"));

    // Pausing again is an informational no-op
    gtd(town.path())
        .arg("pause")
        .assert()
        .success()
        .stdout(predicate::str::contains("already paused"));

    gtd(town.path())
        .arg("resume")
        .assert()
        .success()
        .stdout(predicate::str::contains("resumed"));

    gtd(town.path())
        .arg("resume")
        .assert()
        .success()
        .stdout(predicate::str::contains("not paused"));
}

#[test]
fn paused_deacon_refuses_heartbeat_and_remediation() {
    let town = tempfile::tempdir().unwrap();

    gtd(town.path())
        .args(["pause", "--reason", "testing"])
        .assert()
        .success();

    gtd(town.path())
        .arg("heartbeat")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("paused"));

    // Paused exits 1, never the redispatch outcome codes 2/3
    gtd(town.path())
        .args(["redispatch", "gt-a1b2"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("paused"));

    gtd(town.path())
        .args(["stale-hooks", "--dry-run"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("paused"));
}

#[test]
fn heartbeat_records_action() {
    let town = tempfile::tempdir().unwrap();

    gtd(town.path())
        .args(["heartbeat", "checking", "witnesses"])
        .assert()
        .success()
        .stdout(predicate::str::contains("heartbeat updated: checking witnesses"));

    gtd(town.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("checking witnesses"));
}

#[test]
fn health_state_starts_empty() {
    let town = tempfile::tempdir().unwrap();
    gtd(town.path())
        .arg("health-state")
        .assert()
        .success()
        .stdout(predicate::str::contains("no health check state recorded yet"));
}

#[test]
fn health_state_json_is_a_document() {
    let town = tempfile::tempdir().unwrap();
    let output = gtd(town.path())
        .args(["health-state", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(doc.get("agents").is_some());
    assert!(doc.get("last_updated").is_some());
}

#[test]
fn schema_prints_config_schema() {
    let output = Command::cargo_bin("gtd")
        .unwrap()
        .arg("schema")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let schema: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let text = schema.to_string();
    assert!(text.contains("deacon"));
    assert!(text.contains("failure_threshold"));
}

#[test]
fn missing_town_root_is_a_config_error() {
    let mut cmd = Command::cargo_bin("gtd").unwrap();
    // Point at an empty directory tree with no .gastown.toml anywhere above
    let scratch = tempfile::tempdir().unwrap();
    cmd.current_dir(scratch.path());
    cmd.env("GASTOWN_ROOT", scratch.path().join("does-not-exist"));
    cmd.arg("status");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("GASTOWN_ROOT"));
}
