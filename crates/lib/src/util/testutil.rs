//! Test utilities for toolsmith-lib.
//!
//! [`FakeTool`] stands in for the external configure/make/install toolchain.
//! It records every invocation, writes declared files so later steps and
//! components have something on disk to work with, and fails on demand.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::tool::{BuildHandle, BuildTool, ToolEnv, ToolError};

/// Which external operation an invocation was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
  Configure,
  Make,
  Install,
  Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
  Configure {
    component: String,
    flags: Vec<String>,
    env: ToolEnv,
  },
  Make {
    component: String,
    target: Option<String>,
    args: Vec<String>,
  },
  Install {
    component: String,
    target: String,
    dest_root: PathBuf,
    args: Vec<String>,
  },
  Query {
    compiler: PathBuf,
  },
}

impl Invocation {
  pub fn op(&self) -> Op {
    match self {
      Invocation::Configure { .. } => Op::Configure,
      Invocation::Make { .. } => Op::Make,
      Invocation::Install { .. } => Op::Install,
      Invocation::Query { .. } => Op::Query,
    }
  }

  pub fn component(&self) -> Option<&str> {
    match self {
      Invocation::Configure { component, .. }
      | Invocation::Make { component, .. }
      | Invocation::Install { component, .. } => Some(component),
      Invocation::Query { .. } => None,
    }
  }
}

/// Recording fake of the external build tool.
#[derive(Debug, Default)]
pub struct FakeTool {
  calls: Mutex<Vec<Invocation>>,
  failures: Mutex<HashSet<(String, Op)>>,
  installs: BTreeMap<String, Vec<String>>,
  build_outputs: BTreeMap<String, Vec<String>>,
  multilib: Vec<String>,
}

impl FakeTool {
  pub fn new() -> Self {
    Self {
      multilib: vec![".".to_string()],
      ..Default::default()
    }
  }

  /// Fragments returned by `query_multilib_dirs`.
  pub fn with_multilib(mut self, fragments: &[&str]) -> Self {
    self.multilib = fragments.iter().map(|s| s.to_string()).collect();
    self
  }

  /// Files (relative to the install root) written by `component`'s install.
  pub fn installs(mut self, component: &str, files: &[&str]) -> Self {
    self
      .installs
      .insert(component.to_string(), files.iter().map(|s| s.to_string()).collect());
    self
  }

  /// Files (relative to the build dir) written by `component`'s default make.
  pub fn builds(mut self, component: &str, files: &[&str]) -> Self {
    self
      .build_outputs
      .insert(component.to_string(), files.iter().map(|s| s.to_string()).collect());
    self
  }

  pub fn fail(&self, component: &str, op: Op) {
    self.failures.lock().unwrap().insert((component.to_string(), op));
  }

  pub fn clear_failures(&self) {
    self.failures.lock().unwrap().clear();
  }

  pub fn invocations(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  /// Invocations excluding multilib queries.
  pub fn build_invocations(&self) -> Vec<Invocation> {
    self
      .invocations()
      .into_iter()
      .filter(|i| i.op() != Op::Query)
      .collect()
  }

  pub fn count(&self, op: Op) -> usize {
    self.invocations().iter().filter(|i| i.op() == op).count()
  }

  /// Components configured, in order.
  pub fn configured(&self) -> Vec<String> {
    self
      .invocations()
      .iter()
      .filter(|i| i.op() == Op::Configure)
      .filter_map(|i| i.component().map(str::to_string))
      .collect()
  }

  pub fn reset(&self) {
    self.calls.lock().unwrap().clear();
  }

  fn record(&self, invocation: Invocation) {
    self.calls.lock().unwrap().push(invocation);
  }

  fn should_fail(&self, component: &str, op: Op) -> bool {
    self.failures.lock().unwrap().contains(&(component.to_string(), op))
  }
}

fn write_files(root: &Path, files: &[String], content: &str) {
  for file in files {
    let path = root.join(file);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
  }
}

impl BuildTool for FakeTool {
  async fn configure(
    &self,
    component: &str,
    source_dir: &Path,
    build_dir: &Path,
    flags: &[String],
    env: &ToolEnv,
  ) -> Result<BuildHandle, ToolError> {
    self.record(Invocation::Configure {
      component: component.to_string(),
      flags: flags.to_vec(),
      env: env.clone(),
    });
    if self.should_fail(component, Op::Configure) {
      return Err(ToolError::Configure {
        component: component.to_string(),
        code: Some(1),
        output: "injected configure failure".to_string(),
      });
    }

    fs::create_dir_all(build_dir).unwrap();
    fs::write(build_dir.join("config.status"), flags.join("\n")).unwrap();
    Ok(BuildHandle {
      component: component.to_string(),
      source_dir: source_dir.to_path_buf(),
      build_dir: build_dir.to_path_buf(),
    })
  }

  async fn make(&self, handle: &BuildHandle, target: Option<&str>, args: &[String], _env: &ToolEnv) -> Result<(), ToolError> {
    self.record(Invocation::Make {
      component: handle.component.clone(),
      target: target.map(str::to_string),
      args: args.to_vec(),
    });
    if self.should_fail(&handle.component, Op::Make) {
      return Err(ToolError::Build {
        component: handle.component.clone(),
        target: target.unwrap_or("(default)").to_string(),
        code: Some(2),
        output: "injected build failure".to_string(),
      });
    }

    if let Some(files) = self.build_outputs.get(&handle.component) {
      write_files(&handle.build_dir, files, &handle.component);
    }
    Ok(())
  }

  async fn install(
    &self,
    handle: &BuildHandle,
    target: &str,
    dest_root: &Path,
    args: &[String],
    _env: &ToolEnv,
  ) -> Result<(), ToolError> {
    self.record(Invocation::Install {
      component: handle.component.clone(),
      target: target.to_string(),
      dest_root: dest_root.to_path_buf(),
      args: args.to_vec(),
    });
    if self.should_fail(&handle.component, Op::Install) {
      return Err(ToolError::Install {
        component: handle.component.clone(),
        target: target.to_string(),
        code: Some(2),
        output: "injected install failure".to_string(),
      });
    }

    fs::create_dir_all(dest_root).unwrap();
    if let Some(files) = self.installs.get(&handle.component) {
      write_files(dest_root, files, &handle.component);
    }
    Ok(())
  }

  async fn query_multilib_dirs(&self, compiler: &Path) -> Result<Vec<String>, ToolError> {
    self.record(Invocation::Query {
      compiler: compiler.to_path_buf(),
    });
    Ok(self.multilib.clone())
  }
}
