//! Adapter over the external configure/make/install toolchain.
//!
//! The pipeline treats the autoconf-style build system as an opaque
//! capability described by [`BuildTool`]. [`Autotools`] drives the real thing
//! through `tokio::process`; tests substitute a recording fake.
//!
//! Every call receives an explicit [`ToolEnv`] that is layered over the
//! inherited process environment of the child only. The parent process
//! environment is never modified.
//!
//! # Submodules
//!
//! - [`autotools`] - `configure` + `make` implementation
//! - [`multilib`] - parsing of `-print-multi-lib` output

pub mod autotools;
pub mod multilib;

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use autotools::Autotools;

/// Environment overrides for one tool invocation.
pub type ToolEnv = BTreeMap<String, String>;

/// A configured build tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHandle {
  pub component: String,
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {code}"),
    None => "terminated by signal".to_string(),
  }
}

/// Failures of external tool invocations. `output` holds the tail of what the
/// tool printed.
#[derive(Debug, Error)]
pub enum ToolError {
  #[error("configure of {component} failed ({})\n{output}", describe_exit(code))]
  Configure {
    component: String,
    code: Option<i32>,
    output: String,
  },

  #[error("make {target} for {component} failed ({})\n{output}", describe_exit(code))]
  Build {
    component: String,
    target: String,
    code: Option<i32>,
    output: String,
  },

  #[error("make {target} for {component} failed ({})\n{output}", describe_exit(code))]
  Install {
    component: String,
    target: String,
    code: Option<i32>,
    output: String,
  },

  #[error("querying {} failed: {message}", program.display())]
  Query { program: PathBuf, message: String },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },
}

impl ToolError {
  /// The captured tool output, if the tool ran at all.
  pub fn output(&self) -> Option<&str> {
    match self {
      ToolError::Configure { output, .. } | ToolError::Build { output, .. } | ToolError::Install { output, .. } => {
        Some(output)
      }
      ToolError::Query { .. } | ToolError::Spawn { .. } => None,
    }
  }
}

/// External configure/build/install capability.
pub trait BuildTool {
  /// Configure `source_dir` into `build_dir` with `flags`.
  fn configure(
    &self,
    component: &str,
    source_dir: &Path,
    build_dir: &Path,
    flags: &[String],
    env: &ToolEnv,
  ) -> impl Future<Output = Result<BuildHandle, ToolError>>;

  /// Build `target`, or the tool's default goal when `None`.
  fn make(
    &self,
    handle: &BuildHandle,
    target: Option<&str>,
    args: &[String],
    env: &ToolEnv,
  ) -> impl Future<Output = Result<(), ToolError>>;

  /// Run the install goal `target`, populating `dest_root`.
  fn install(
    &self,
    handle: &BuildHandle,
    target: &str,
    dest_root: &Path,
    args: &[String],
    env: &ToolEnv,
  ) -> impl Future<Output = Result<(), ToolError>>;

  /// Ask a built compiler for its multilib directory fragments.
  fn query_multilib_dirs(&self, compiler: &Path) -> impl Future<Output = Result<Vec<String>, ToolError>>;
}

/// Last `lines` lines of `text`.
pub(crate) fn tail(text: &str, lines: usize) -> String {
  let all: Vec<&str> = text.lines().collect();
  let start = all.len().saturating_sub(lines);
  all[start..].join("\n")
}
