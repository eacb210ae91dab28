//! Real `configure` + `make` driver.

use std::ffi::OsString;
use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use super::{BuildHandle, BuildTool, ToolEnv, ToolError, multilib, tail};
use crate::consts::TOOL_OUTPUT_TAIL_LINES;

/// Runs autoconf configure scripts and GNU make.
#[derive(Debug, Clone)]
pub struct Autotools {
  make: String,
  jobs: usize,
}

impl Autotools {
  pub fn new(jobs: usize) -> Self {
    Self {
      make: "make".to_string(),
      jobs: jobs.max(1),
    }
  }

  /// Use a different make program (e.g. `gmake`).
  pub fn with_make(mut self, program: impl Into<String>) -> Self {
    self.make = program.into();
    self
  }

  pub fn jobs(&self) -> usize {
    self.jobs
  }

  /// Arguments for one make invocation. Whitespace in `goals` separates
  /// several goals.
  fn make_args(&self, goals: Option<&str>, args: &[String]) -> Vec<String> {
    let mut out = vec![format!("-j{}", self.jobs)];
    out.extend(goals.into_iter().flat_map(str::split_whitespace).map(str::to_string));
    out.extend(args.iter().cloned());
    out
  }

  async fn run_make(&self, handle: &BuildHandle, goals: Option<&str>, args: &[String], env: &ToolEnv) -> Result<Output, ToolError> {
    let args = self.make_args(goals, args);
    run(&self.make, args.iter().map(OsString::from).collect(), &handle.build_dir, env).await
  }
}

impl Default for Autotools {
  fn default() -> Self {
    let jobs = std::thread::available_parallelism().map(usize::from).unwrap_or(1);
    Self::new(jobs)
  }
}

/// Spawn `program` in `cwd` with `env` layered over the inherited environment.
async fn run(program: &str, args: Vec<OsString>, cwd: &Path, env: &ToolEnv) -> Result<Output, ToolError> {
  debug!(program, args = ?args, cwd = %cwd.display(), "spawning tool");

  let output = Command::new(program)
    .args(&args)
    .current_dir(cwd)
    .envs(env)
    .output()
    .await
    .map_err(|source| ToolError::Spawn {
      program: program.to_string(),
      source,
    })?;

  let stdout = String::from_utf8_lossy(&output.stdout);
  if !stdout.is_empty() {
    debug!(stdout = %tail(&stdout, TOOL_OUTPUT_TAIL_LINES), "tool output");
  }

  Ok(output)
}

/// Tail of stderr, or of stdout when stderr is empty.
fn failure_output(output: &Output) -> String {
  let stderr = String::from_utf8_lossy(&output.stderr);
  if stderr.trim().is_empty() {
    tail(&String::from_utf8_lossy(&output.stdout), TOOL_OUTPUT_TAIL_LINES)
  } else {
    tail(&stderr, TOOL_OUTPUT_TAIL_LINES)
  }
}

impl BuildTool for Autotools {
  async fn configure(
    &self,
    component: &str,
    source_dir: &Path,
    build_dir: &Path,
    flags: &[String],
    env: &ToolEnv,
  ) -> Result<BuildHandle, ToolError> {
    tokio::fs::create_dir_all(build_dir)
      .await
      .map_err(|source| ToolError::Spawn {
        program: "configure".to_string(),
        source,
      })?;

    // configure scripts are POSIX shell; running them through sh also works
    // under msys where the script itself is not executable.
    let mut args = vec![source_dir.join("configure").into_os_string()];
    args.extend(flags.iter().map(OsString::from));

    let output = run("sh", args, build_dir, env).await?;
    if !output.status.success() {
      return Err(ToolError::Configure {
        component: component.to_string(),
        code: output.status.code(),
        output: failure_output(&output),
      });
    }

    Ok(BuildHandle {
      component: component.to_string(),
      source_dir: source_dir.to_path_buf(),
      build_dir: build_dir.to_path_buf(),
    })
  }

  async fn make(&self, handle: &BuildHandle, target: Option<&str>, args: &[String], env: &ToolEnv) -> Result<(), ToolError> {
    let output = self.run_make(handle, target, args, env).await?;
    if !output.status.success() {
      return Err(ToolError::Build {
        component: handle.component.clone(),
        target: target.unwrap_or("(default)").to_string(),
        code: output.status.code(),
        output: failure_output(&output),
      });
    }
    Ok(())
  }

  async fn install(
    &self,
    handle: &BuildHandle,
    target: &str,
    dest_root: &Path,
    args: &[String],
    env: &ToolEnv,
  ) -> Result<(), ToolError> {
    // The prefix was fixed at configure time; dest_root only has to exist.
    tokio::fs::create_dir_all(dest_root)
      .await
      .map_err(|source| ToolError::Spawn {
        program: self.make.clone(),
        source,
      })?;

    let output = self.run_make(handle, Some(target), args, env).await?;
    if !output.status.success() {
      return Err(ToolError::Install {
        component: handle.component.clone(),
        target: target.to_string(),
        code: output.status.code(),
        output: failure_output(&output),
      });
    }
    Ok(())
  }

  async fn query_multilib_dirs(&self, compiler: &Path) -> Result<Vec<String>, ToolError> {
    let program = compiler.to_string_lossy();
    let cwd = compiler.parent().unwrap_or_else(|| Path::new("."));
    let output = run(&program, vec![OsString::from("-print-multi-lib")], cwd, &ToolEnv::new()).await?;

    if !output.status.success() {
      return Err(ToolError::Query {
        program: compiler.to_path_buf(),
        message: failure_output(&output),
      });
    }

    let dirs = multilib::parse_multilib_output(&String::from_utf8_lossy(&output.stdout));
    debug!(compiler = %compiler.display(), count = dirs.len(), "multilib dirs");
    Ok(dirs)
  }
}
