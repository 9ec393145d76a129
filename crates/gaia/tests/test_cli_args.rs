//! CLI argument parsing tests for gaia

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn gaia() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gaia"))
}

#[test]
fn test_help_flag() {
    gaia()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("GAIA benchmark questions"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_version_flag() {
    gaia()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_usage() {
    gaia()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_subcommand() {
    gaia()
        .arg("engage")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_ask_help() {
    gaia()
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Answer a single question"))
        .stdout(predicate::str::contains("-f, --file"));
}

#[test]
fn test_ask_requires_question() {
    gaia()
        .arg("ask")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<QUESTION>"));
}

#[test]
fn test_run_help() {
    gaia()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-q, --questions"))
        .stdout(predicate::str::contains("-a, --attachments"))
        .stdout(predicate::str::contains("-o, --out"))
        .stdout(predicate::str::contains("-j, --concurrency"));
}

#[test]
fn test_run_requires_questions() {
    gaia()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--questions"));
}

#[test]
fn test_run_rejects_non_numeric_concurrency() {
    gaia()
        .args(["run", "-q", "questions.json", "-j", "many"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
