//! Integration tests for the command-line interface
//!
//! Tests the validate, preprocess and script commands against spec files
//! in a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const VALID_SPEC: &str = r#"
name: app
sources:
  app:
    git:
      url: https://github.com/example/app.git
      commit: v1.0.0
    generate:
      - gomod:
          edits:
            require:
              - "example.com/a:example.com/a@v1.2.0"
            replace:
              - "github.com/old/dep:github.com/new/dep@v1.4.0"
"#;

const INVALID_SPEC: &str = r#"{
  "sources": {
    "app": {"generate": [{"subpath": "/abs"}]}
  }
}"#;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gomod-patcher"));
    cmd.env_remove("GOMOD_PATCHER_WORKER")
        .env_remove("RUST_LOG")
        .env_remove("CLICOLOR_FORCE")
        .env("CLICOLOR", "0")
        .env("NO_COLOR", "1");
    cmd
}

fn run(cmd: &mut Command) -> (Output, String, String) {
    let output = cmd.output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (output, stdout, stderr)
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let (output, stdout, _) = run(bin().arg("--help"));

    assert!(output.status.success());
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("preprocess"));
    assert!(stdout.contains("script"));
}

#[test]
fn test_validate_reports_each_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a-valid.yml", VALID_SPEC);
    write(dir.path(), "b-invalid.json", INVALID_SPEC);
    write(dir.path(), "notes.txt", "not a spec");

    let (output, stdout, stderr) = run(bin().arg("validate").arg(dir.path()));

    assert!(!output.status.success());
    assert!(stdout.contains("a-valid.yml: 1 sources, 1 with gomod edits"));
    assert!(stderr.contains("b-invalid.json: 2 issue(s)"));
    assert!(stderr.contains("sources.app: source must declare one of"));
    assert!(stderr.contains("sources.app.generate[0].subpath: path '/abs' must be relative"));
    assert!(!stdout.contains("notes.txt"));
    assert!(stdout.contains("1 valid"));
    assert!(stdout.contains("1 invalid"));
}

#[test]
fn test_validate_valid_file_succeeds() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.yaml", VALID_SPEC);

    let (output, stdout, _) = run(bin().arg("validate").arg(&spec));

    assert!(output.status.success());
    assert!(stdout.contains("0 invalid"));
}

#[test]
fn test_preprocess_prints_generated_sources() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.yml", VALID_SPEC);

    let (output, stdout, _) = run(bin().arg("preprocess").arg(&spec));

    assert!(output.status.success());
    assert!(stdout.contains("Worker: docker.io/library/golang:1.23"));
    assert!(stdout.contains("app [generator 0] -> __gomod_patch_app"));
    assert!(stdout.contains("1 patch source(s) generated"));
}

#[test]
fn test_preprocess_worker_from_environment() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.yml", VALID_SPEC);

    let (output, stdout, _) = run(bin()
        .env("GOMOD_PATCHER_WORKER", "registry.example.com/go:1.24")
        .arg("preprocess")
        .arg(&spec));

    assert!(output.status.success());
    assert!(stdout.contains("Worker: registry.example.com/go:1.24"));
}

#[test]
fn test_preprocess_json_output() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.yml", VALID_SPEC);

    let (output, stdout, _) = run(bin()
        .arg("preprocess")
        .arg(&spec)
        .args(["--json", "--platform", "linux/arm64"]));

    assert!(output.status.success());
    let generated: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let first = &generated[0];
    assert_eq!(first["source"], "app");
    assert_eq!(first["patch_source"], "__gomod_patch_app");
    assert_eq!(first["state"]["op"], "file");
    assert_eq!(first["state"]["constraints"]["platform"], "linux/arm64");
}

#[test]
fn test_preprocess_diff_shows_registered_patch() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.yml", VALID_SPEC);

    let (output, stdout, _) = run(bin().arg("preprocess").arg(&spec).arg("--diff"));

    assert!(output.status.success());
    assert!(stdout.contains("(preprocessed)"));
    assert!(stdout
        .lines()
        .any(|line| line.starts_with('+') && line.contains("source: __gomod_patch_app")));
    assert!(stdout.contains("gomod.patch"));
    assert!(!stdout.contains("__gomod_patch_app: {}"));
}

#[test]
fn test_preprocess_invalid_spec_fails() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.json", INVALID_SPEC);

    let (output, _, stderr) = run(bin().arg("preprocess").arg(&spec));

    assert!(!output.status.success());
    assert!(stderr.contains("invalid spec"));
}

#[test]
fn test_script_prints_sandbox_procedure() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.yml", VALID_SPEC);

    let (output, stdout, _) = run(bin().arg("script").arg(&spec).args(["--source", "app"]));

    assert!(output.status.success());
    assert!(stdout.starts_with("#!/usr/bin/env sh"));
    assert!(stdout.contains(
        "go mod edit -replace=github.com/old/dep=github.com/new/dep@v1.4.0 -require=example.com/a@v1.2.0"
    ));
}

#[test]
fn test_script_unknown_source_fails() {
    let dir = TempDir::new().unwrap();
    let spec = write(dir.path(), "spec.yml", VALID_SPEC);

    let (output, _, stderr) = run(bin().arg("script").arg(&spec).args(["--source", "nope"]));

    assert!(!output.status.success());
    assert!(stderr.contains("Source 'nope' not found"));
}
