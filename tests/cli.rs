//! CLI smoke tests.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("rxverify").unwrap()
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--port"))
        .stdout(contains("--lang"));
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}
