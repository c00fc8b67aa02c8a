use cheque_milestone::{ContractSnapshot, MilestoneId};
use cheque_test_utils::*;
use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn snapshot_file(snapshot: &ContractSnapshot) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(snapshot).unwrap().as_bytes())
        .unwrap();
    file
}

fn run(args: &[&str], snapshot: &NamedTempFile) -> Output {
    Command::new(env!("CARGO_BIN_EXE_milestone-engine"))
        .args(args)
        .arg("--snapshot")
        .arg(snapshot.path())
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

#[test]
fn order_as_json() {
    let file = snapshot_file(&fork_contract());
    let out = run(&["order", "--json"], &file);
    assert!(out.status.success());

    let ids: Vec<MilestoneId> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(ids, vec![A, B, C]);
}

#[test]
fn validate_exits_one_on_cycle() {
    let file = snapshot_file(&cyclic_contract());
    let out = run(&["validate"], &file);
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("dependency cycle involving 2 milestone(s)"));
}

#[test]
fn timeline_reports_fork_durations() {
    let file = snapshot_file(&fork_contract());
    let out = run(&["timeline", "--json"], &file);
    assert!(out.status.success());

    let body: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(body["critical_path_duration"], 5 * 24 * 3600);
    assert_eq!(body["entries"].as_array().map(Vec::len), Some(3));
}

#[test]
fn missing_snapshot_is_an_error() {
    let out = Command::new(env!("CARGO_BIN_EXE_milestone-engine"))
        .args(["stats", "--snapshot", "/nonexistent/snapshot.json"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("reading snapshot"));
}
