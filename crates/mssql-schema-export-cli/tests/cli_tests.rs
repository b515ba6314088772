//! CLI integration tests for mssql-schema-export.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for errors raised before any connection is made.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mssql-schema-export binary.
fn cmd() -> Command {
    Command::cargo_bin("mssql-schema-export").unwrap()
}

/// Command with every required flag set.
fn export_cmd(output: &std::path::Path) -> Command {
    let mut c = cmd();
    c.args(["-s", "localhost", "-u", "sa", "-p", "secret", "-d", "Sales"])
        .arg("-o")
        .arg(output);
    c
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_lists_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--username"))
        .stdout(predicate::str::contains("--password"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--database"))
        .stdout(predicate::str::contains("--skip-use"))
        .stdout(predicate::str::contains("--split-tables"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mssql-schema-export"));
}

#[test]
fn test_log_defaults_in_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Missing Required Flags
// =============================================================================

#[test]
fn test_no_arguments_prints_usage() {
    cmd()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_missing_database_flag() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["-s", "localhost", "-u", "sa", "-p", "secret", "-o"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--database"));

    // Nothing was exported.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_password_flag() {
    cmd()
        .args(["-s", "localhost", "-u", "sa", "-o", "out", "-d", "Sales"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password"));
}

// =============================================================================
// Configuration Errors (exit before connecting)
// =============================================================================

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    export_cmd(dir.path())
        .args(["--config", "/nonexistent/export.yaml"])
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file("export: [unclosed");
    export_cmd(dir.path())
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("YAML error"));
}

#[test]
fn test_invalid_rule_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(
        r#"
rules:
  - type: table
    rules:
      - pattern: "tbl_("
        replacement: "x"
"#,
    );
    export_cmd(dir.path())
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid rule pattern 'tbl_('"));
}

#[test]
fn test_duplicate_rule_group() {
    let dir = tempfile::tempdir().unwrap();
    let file = config_file(
        r#"
rules:
  - type: view
    rules: []
  - type: view
    rules: []
"#,
    );
    export_cmd(dir.path())
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("duplicate group"));
}

#[test]
fn test_zero_workers_rejected() {
    let dir = tempfile::tempdir().unwrap();
    export_cmd(dir.path())
        .args(["--workers", "0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("workers"));
}

#[test]
fn test_empty_server_rejected() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["-s", "", "-u", "sa", "-p", "secret", "-d", "Sales", "-o"])
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("server host is required"));
}
