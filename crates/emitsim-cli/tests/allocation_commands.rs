use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn prepare_command() -> (Command, TempDir) {
    let temp_dir = tempdir().expect("create temp dir");
    let mut cmd = cargo_bin_cmd!("emitsim-cli");
    cmd.env("RUST_LOG", "error")
        .env("EMITSIM_DATABASE", temp_dir.path().join("allocations.db"));
    (cmd, temp_dir)
}

fn book(cmd: &mut Command, from: &str, to: &str, label: &str) {
    cmd.args([
        "book", "--table", "runways", "--resource", "RW16L", "--from", from, "--to", to, "--label",
        label,
    ]);
}

#[test]
fn conflicting_booking_fails_then_moves() {
    let (mut cmd, temp) = prepare_command();
    book(&mut cmd, "2024-05-01T10:00:00Z", "2024-05-01T10:10:00Z", "AF123");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Booked AF123 on RW16L"));

    let db = temp.path().join("allocations.db");
    let mut conflict = cargo_bin_cmd!("emitsim-cli");
    conflict.env("RUST_LOG", "error").env("EMITSIM_DATABASE", &db);
    book(&mut conflict, "2024-05-01T10:05:00Z", "2024-05-01T10:15:00Z", "BA456");
    conflict
        .assert()
        .failure()
        .stderr(predicate::str::contains("RW16L is busy"))
        .stderr(predicate::str::contains("2024-05-01T10:10:00.001+00:00"));

    let mut moved = cargo_bin_cmd!("emitsim-cli");
    moved.env("RUST_LOG", "error").env("EMITSIM_DATABASE", &db);
    book(&mut moved, "2024-05-01T10:05:00Z", "2024-05-01T10:15:00Z", "BA456");
    moved
        .arg("--first-available")
        .assert()
        .success()
        .stdout(predicate::str::contains("Booked BA456 on RW16L: 2024-05-01T10:10:00.001+00:00"));

    let mut list = cargo_bin_cmd!("emitsim-cli");
    let output = list
        .env("RUST_LOG", "error")
        .env("EMITSIM_DATABASE", &db)
        .args(["--format", "json", "allocations", "--table", "runways"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let snapshot: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    let labels: Vec<&str> = snapshot["RW16L"]
        .as_array()
        .expect("RW16L rows")
        .iter()
        .filter_map(|row| row["label"].as_str())
        .collect();
    assert_eq!(labels, ["AF123", "BA456"]);
}

#[test]
fn missing_database_is_reported() {
    let mut cmd = cargo_bin_cmd!("emitsim-cli");
    cmd.env("RUST_LOG", "error")
        .env_remove("EMITSIM_DATABASE")
        .args(["allocations", "--table", "runways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no allocation database given"));
}

#[test]
fn empty_table_lists_nothing() {
    let (mut cmd, _temp) = prepare_command();
    cmd.args(["allocations", "--table", "ramps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ramps: no allocations"));
}
