//! CLI integration tests for write-to-server.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no live server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the write-to-server binary.
fn cmd() -> Command {
    Command::cargo_bin("write-to-server").unwrap()
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const VALID_CONFIG: &str = r#"
connection_strings:
  Demo: "Server=tcp:127.0.0.1,1;Database=demo;User Id=sa;Password=secret"
bulk:
  batch_size: 500
"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("health-check"))
        .stdout(predicate::str::contains("seed"))
        .stdout(predicate::str::contains("describe"));
}

#[test]
fn test_seed_subcommand_help() {
    cmd()
        .args(["seed", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--rows"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--no-transaction"))
        .stdout(predicate::str::contains("--create-table"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("write-to-server"));
}

#[test]
fn test_seed_requires_rows() {
    cmd()
        .args(["seed", "--context", "Demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rows"));
}

// =============================================================================
// Describe Tests
// =============================================================================

#[test]
fn test_describe_prints_schema_json() {
    let output = cmd().arg("describe").assert().success().get_output().clone();
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(schema["table_name"], "dbo.WriteToServerDemo");
    assert_eq!(schema["qualified_name"], "[dbo].[WriteToServerDemo]");
    let columns = schema["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 4);
    assert_eq!(columns[0]["name"], "Id");
    assert_eq!(columns[0]["auto_increment"], true);
    assert_eq!(columns[1]["allow_null"], true);
    assert_eq!(columns[2]["max_length"], 254);
}

#[test]
fn test_describe_ddl() {
    cmd()
        .args(["describe", "--ddl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE [dbo].[WriteToServerDemo]"))
        .stdout(predicate::str::contains("[Id] int IDENTITY(1,1) NOT NULL"))
        .stdout(predicate::str::contains("[CreatedAt] datetime2 NOT NULL"));
}

#[test]
fn test_describe_ignores_missing_config() {
    cmd()
        .args(["--config", "/nonexistent/config.yaml", "describe"])
        .assert()
        .success();
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_io_error() {
    cmd()
        .args(["--config", "/nonexistent/config.yaml", "health-check", "--context", "Demo"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_config_error() {
    let file = config_file("connection_strings: [this is: not a map");

    cmd()
        .arg("--config")
        .arg(file.path())
        .args(["health-check", "--context", "Demo"])
        .assert()
        .code(1);
}

#[test]
fn test_config_without_connection_strings_exits_config_error() {
    let file = config_file("bulk:\n  batch_size: 100\n");

    cmd()
        .arg("--config")
        .arg(file.path())
        .args(["health-check", "--context", "Demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_zero_batch_size_in_config_rejected() {
    let file = config_file(
        "connection_strings:\n  Demo: \"Server=tcp:127.0.0.1,1\"\nbulk:\n  batch_size: 0\n",
    );

    cmd()
        .arg("--config")
        .arg(file.path())
        .args(["seed", "--context", "Demo", "--rows", "1"])
        .assert()
        .code(1);
}

#[test]
fn test_unknown_context_exits_config_error() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .arg("--config")
        .arg(file.path())
        .args(["seed", "--context", "Nope", "--rows", "3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Nope"))
        .stderr(predicate::str::contains("Demo"));
}

#[test]
fn test_unknown_verbosity_exits_config_error() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .arg("--config")
        .arg(file.path())
        .args(["--verbosity", "loud", "health-check", "--context", "Demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown verbosity"));
}

#[test]
fn test_password_not_echoed_on_error() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .arg("--config")
        .arg(file.path())
        .args(["seed", "--context", "Nope", "--rows", "3"])
        .assert()
        .stderr(predicate::str::contains("secret").not());
}
