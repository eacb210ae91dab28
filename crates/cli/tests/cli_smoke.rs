//! CLI smoke tests for toolsmith.
//!
//! These tests verify that the commands run without panicking and return
//! appropriate exit codes. No real toolchain sources are involved.

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the toolsmith binary.
fn toolsmith_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("toolsmith");
  cmd.env_remove("RUST_LOG").env("NO_COLOR", "1");
  cmd
}

/// Create a temp directory holding `toolchain.toml` and an empty workspace.
fn temp_project(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("toolchain.toml"), content).unwrap();
  std::fs::create_dir(temp.path().join("work")).unwrap();
  temp
}

/// Command running in `project` against its own workspace.
fn project_cmd(project: &Path) -> Command {
  let mut cmd = toolsmith_cmd();
  cmd.current_dir(project).arg("--root").arg(project.join("work"));
  cmd
}

const TOOLCHAIN: &str = r#"
target = "arm-none-eabi"
host = "x86_64-linux-gnu"
jobs = 1

[[components]]
name = "binutils"
kind = "binutils"
source = "binutils-src"

[[components]]
name = "gcc_newlib"
kind = "compiler"
source = "gcc-src"

[components.library]
name = "newlib"
kind = "library"
source = "newlib-src"
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  toolsmith_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  toolsmith_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("toolsmith"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "status", "invalidate"] {
    toolsmith_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn unknown_profile_is_rejected() {
  toolsmith_cmd()
    .args(["status", "--profile", "fastest"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown profile"));
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn missing_config_fails() {
  let temp = TempDir::new().unwrap();
  toolsmith_cmd()
    .current_dir(temp.path())
    .arg("status")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn invalid_config_fails() {
  let project = temp_project("target = \"\"\n");
  project_cmd(project.path())
    .arg("status")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load configuration"));
}

// =============================================================================
// Status
// =============================================================================

#[test]
fn status_lists_pending_components() {
  let project = temp_project(TOOLCHAIN);
  project_cmd(project.path())
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("binutils"))
    .stdout(predicate::str::contains("newlib"))
    .stdout(predicate::str::contains("pending"));
}

#[test]
fn status_verbose_shows_layout() {
  let project = temp_project(TOOLCHAIN);
  project_cmd(project.path())
    .args(["-v", "status"])
    .assert()
    .success()
    .stdout(predicate::str::contains("staging"))
    .stdout(predicate::str::contains("n/a"));
}

#[test]
fn status_json_is_parseable() {
  let project = temp_project(TOOLCHAIN);
  let output = project_cmd(project.path())
    .args(["status", "--json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(value["complete"], false);
  assert_eq!(value["profile"], "release");
  let components = value["components"].as_array().unwrap();
  assert_eq!(components.len(), 2);
  assert_eq!(components[1]["library"]["component"], "newlib");
  assert_eq!(components[0]["steps"][0]["state"], "pending");
}

// =============================================================================
// Invalidate
// =============================================================================

#[test]
fn invalidate_unknown_component_fails() {
  let project = temp_project(TOOLCHAIN);
  project_cmd(project.path())
    .args(["invalidate", "gdb"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown component 'gdb'"));
}

#[test]
fn invalidate_rejects_unknown_step() {
  toolsmith_cmd()
    .args(["invalidate", "binutils", "--from", "link"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown build step"));
}

#[test]
fn invalidate_removes_markers() {
  let project = temp_project(TOOLCHAIN);
  let build_dir = project.path().join("work/build/arm-none-eabi/newlib");
  std::fs::create_dir_all(&build_dir).unwrap();
  std::fs::write(build_dir.join(".configured"), "").unwrap();
  std::fs::write(build_dir.join(".built"), "").unwrap();

  project_cmd(project.path())
    .args(["invalidate", "newlib", "--from", "build"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Invalidated newlib from build"));

  assert!(build_dir.join(".configured").exists());
  assert!(!build_dir.join(".built").exists());
}

// =============================================================================
// Build
// =============================================================================

#[cfg(unix)]
#[test]
fn build_without_sources_reports_failed_step() {
  let project = temp_project(TOOLCHAIN);
  project_cmd(project.path())
    .arg("build")
    .assert()
    .code(1)
    .stdout(predicate::str::contains("not run"))
    .stderr(predicate::str::contains("binutils at configure"));
}

#[cfg(unix)]
#[test]
fn build_json_reports_failure() {
  let project = temp_project(TOOLCHAIN);
  let output = project_cmd(project.path())
    .args(["build", "--json", "--no-docs"])
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(1));

  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(value["failed_component"], "binutils");
  assert_eq!(value["failed_step"], "configure");
  assert_eq!(value["components"][1]["outcome"], "not-run");
}
