//! End-to-end tests for the `hypernode` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn hypernode(state: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("hypernode").unwrap();
    cmd.arg("--state").arg(state).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("hypernode")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("market"))
        .stdout(predicate::str::contains("sweep"));
}

#[test]
fn deposit_and_balance_round_through_the_ledger_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("ledger.json");
    let account = "11111111111111111111111111111111";

    hypernode(&state)
        .args(["deposit", account, "2.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.500000 HYPER"));
    assert!(state.exists());

    hypernode(&state)
        .args(["--format", "json", "balance", account])
        .assert()
        .success()
        .stdout(predicate::str::contains("2500000"));
}

#[test]
fn unknown_market_fails_with_message() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("ledger.json");

    hypernode(&state)
        .args(["sweep", "11111111111111111111111111111111"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("market not found"));
}

#[test]
fn malformed_key_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    hypernode(&dir.path().join("ledger.json"))
        .args(["balance", "not-base58!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}
