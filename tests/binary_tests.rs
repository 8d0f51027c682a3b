//! Integration tests for the sql-query-agent binary.

use std::io::Write;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::{NamedTempFile, TempDir};

/// Binary run from an empty directory with no inherited configuration
fn cmd(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("sql-query-agent");
    cmd.current_dir(dir.path())
        .env_clear()
        .env("HOME", dir.path())
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("schema"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    cmd(&dir).arg("--version").assert().success();
}

#[test]
fn test_ask_without_configuration_fails() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .args(["ask", "How many orders?"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_ask_without_api_key_fails() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .env("PROJECT_ID", "p")
        .env("DATASET_ID", "d")
        .args(["ask", "How many orders?", "--provider", "openai"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_invalid_env_number_fails() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .env("MAX_REGENERATIONS", "many")
        .arg("schema")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_schema_without_dataset_fails() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .env("PROJECT_ID", "p")
        .arg("schema")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .args(["--config", "/nonexistent/agent.toml", "schema"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "[agent]\nmax_regenerations = \"lots\"").unwrap();
    cmd(&dir)
        .args(["--config", config.path().to_str().unwrap(), "schema"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_unknown_format_rejected() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .args(["ask", "q", "-f", "sarif"])
        .assert()
        .failure();
}
