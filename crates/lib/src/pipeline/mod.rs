//! Sequential orchestration of component builds.
//!
//! Components are built strictly in declaration order; the order encodes the
//! dependency graph (binutils before compilers, compilers before the
//! debugger). Later components read what earlier ones installed into the
//! shared install root, so nothing runs concurrently.
//!
//! Once any component rebuilds (documentation and cleanup do not count),
//! every later component discards its markers and rebuilds from `configure`. The first failure stops the run; the
//! report names the component and step that failed.

use serde::Serialize;
use tracing::{error, info};

use crate::component::Component;
use crate::driver::{BuildSettings, ComponentBuildDriver};
use crate::layout::PathResolver;
use crate::step::BuildStep;
use crate::tool::BuildTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
  /// At least one step executed.
  Built,
  UpToDate,
  Failed,
  /// Skipped because an earlier component failed.
  NotRun,
}

impl std::fmt::Display for Outcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Outcome::Built => "built",
      Outcome::UpToDate => "up to date",
      Outcome::Failed => "failed",
      Outcome::NotRun => "not run",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentOutcome {
  pub component: String,
  pub target: String,
  pub outcome: Outcome,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
  /// Whether any component executed any step.
  pub changed: bool,
  pub failed_component: Option<String>,
  pub failed_step: Option<BuildStep>,
  /// The failure, including the tail of the tool's output.
  pub error: Option<String>,
  pub components: Vec<ComponentOutcome>,
}

impl BuildReport {
  pub fn succeeded(&self) -> bool {
    self.failed_component.is_none()
  }
}

pub struct ToolchainPipeline<'a, T> {
  tool: &'a T,
  resolver: &'a PathResolver,
  settings: &'a BuildSettings,
}

impl<'a, T: BuildTool> ToolchainPipeline<'a, T> {
  pub fn new(tool: &'a T, resolver: &'a PathResolver, settings: &'a BuildSettings) -> Self {
    Self {
      tool,
      resolver,
      settings,
    }
  }

  pub fn driver(&self, component: &'a Component) -> ComponentBuildDriver<'a, T> {
    ComponentBuildDriver::new(component, self.tool, self.resolver, self.settings)
  }

  /// Builds `components` in order and reports what happened. Failures are
  /// reported, not returned.
  pub async fn run(&self, components: &'a [Component]) -> BuildReport {
    let mut report = BuildReport::default();
    let mut upstream_rebuilt = false;
    info!(components = components.len(), profile = %self.settings.profile, "starting pipeline");

    for (index, component) in components.iter().enumerate() {
      let driver = self.driver(component).with_upstream_changed(upstream_rebuilt);

      match driver.run().await {
        Ok(result) => {
          report.changed |= result.changed;
          upstream_rebuilt |= result.rebuilt;
          let status = if result.changed { Outcome::Built } else { Outcome::UpToDate };
          report.components.push(outcome(component, status));
        }
        Err(err) => {
          error!(component = %err.component, step = %err.step, "pipeline halted");
          report.failed_component = Some(err.component.clone());
          report.failed_step = Some(err.step);
          report.error = Some(err.to_string());
          report.components.push(outcome(component, Outcome::Failed));
          report
            .components
            .extend(components[index + 1..].iter().map(|c| outcome(c, Outcome::NotRun)));
          return report;
        }
      }
    }

    info!(changed = report.changed, "pipeline finished");
    report
  }
}

fn outcome(component: &Component, outcome: Outcome) -> ComponentOutcome {
  ComponentOutcome {
    component: component.name.clone(),
    target: component.target.clone(),
    outcome,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::component::{ComponentKind, Profiled};
  use crate::util::testutil::{FakeTool, Op};
  use std::fs;
  use std::path::PathBuf;
  use tempfile::TempDir;

  const TARGET: &str = "arm-none-eabi";

  fn flags(list: &[&str]) -> Profiled<Vec<String>> {
    Profiled::Uniform(list.iter().map(|s| s.to_string()).collect())
  }

  /// binutils, a base compiler, a compiler with newlib and a staged compiler
  /// with newlib-nano whose libraries are promoted under `_nano` names.
  fn toolchain() -> Vec<Component> {
    let mut binutils = Component::new("binutils", ComponentKind::Binutils, TARGET);
    binutils.config = flags(&["--disable-nls"]);
    binutils.cleanup = vec!["lib".to_string()];

    let mut gcc_base = Component::new("gcc_base", ComponentKind::Compiler, TARGET);
    gcc_base.full_build = false;
    gcc_base.config = flags(&["--without-headers", "--with-newlib"]);

    let mut newlib = Component::new("newlib", ComponentKind::Library, TARGET);
    newlib.config = flags(&["--enable-newlib-io-long-long"]);
    let mut gcc_newlib = Component::new("gcc_newlib", ComponentKind::Compiler, TARGET);
    gcc_newlib.library = Some(Box::new(newlib));

    let mut newlib_nano = Component::new("newlib_nano", ComponentKind::Library, TARGET);
    newlib_nano.staged = true;
    newlib_nano.config = flags(&["--enable-newlib-nano-malloc"]);
    for lib in ["libc", "libg"] {
      newlib_nano.target_files.insert(
        format!("{{multilib_dir}}/{lib}.a"),
        format!("{{multilib_dir}}/{lib}_nano.a"),
      );
    }
    newlib_nano
      .target_files
      .insert("{multilib_dir}/nano.specs".to_string(), "{multilib_dir}/".to_string());

    let mut gcc_nano = Component::new("gcc_newlib_nano", ComponentKind::Compiler, TARGET);
    gcc_nano.staged = true;
    gcc_nano.target_files.insert(
      "{multilib_dir}/libstdc++.a".to_string(),
      "{multilib_dir}/libstdc++_nano.a".to_string(),
    );
    gcc_nano.library = Some(Box::new(newlib_nano));

    vec![binutils, gcc_base, gcc_newlib, gcc_nano]
  }

  fn fake() -> FakeTool {
    FakeTool::new()
      .with_multilib(&[".", "thumb"])
      .installs("binutils", &["bin/arm-none-eabi-as", "bin/arm-none-eabi-ld", "lib/libiberty.a"])
      .installs("gcc_base", &["bin/arm-none-eabi-gcc"])
      .installs(
        "newlib",
        &["arm-none-eabi/lib/libc.a", "arm-none-eabi/lib/thumb/libc.a", "arm-none-eabi/lib/libg.a"],
      )
      .installs("gcc_newlib", &["bin/arm-none-eabi-g++", "arm-none-eabi/lib/libstdc++.a"])
      .installs(
        "newlib_nano",
        &[
          "arm-none-eabi/lib/libc.a",
          "arm-none-eabi/lib/thumb/libc.a",
          "arm-none-eabi/lib/libg.a",
          "arm-none-eabi/lib/nano.specs",
        ],
      )
      .installs(
        "gcc_newlib_nano",
        &["arm-none-eabi/lib/libstdc++.a", "arm-none-eabi/lib/thumb/libstdc++.a"],
      )
  }

  struct Fixture {
    _temp: TempDir,
    resolver: PathResolver,
    settings: BuildSettings,
  }

  impl Fixture {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      let resolver = PathResolver::new(temp.path()).unwrap();
      Self {
        _temp: temp,
        resolver,
        settings: BuildSettings::new("x86_64-linux-gnu"),
      }
    }

    fn installed(&self, rel: &str) -> PathBuf {
      self.resolver.install_dir().join(rel)
    }

    async fn run(&self, tool: &FakeTool, components: &[Component]) -> BuildReport {
      ToolchainPipeline::new(tool, &self.resolver, &self.settings)
        .run(components)
        .await
    }
  }

  #[tokio::test]
  async fn builds_full_toolchain_into_one_tree() {
    let fx = Fixture::new();
    let tool = fake();
    let components = toolchain();

    let report = fx.run(&tool, &components).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert!(report.changed);
    assert_eq!(
      tool.configured(),
      vec!["binutils", "gcc_base", "newlib", "gcc_newlib", "newlib_nano", "gcc_newlib_nano"]
    );

    assert!(fx.installed("bin/arm-none-eabi-as").exists());
    assert!(fx.installed("bin/arm-none-eabi-gcc").exists());
    assert!(!fx.installed("lib").exists(), "binutils cleanup ran");

    // Standard newlib sits in the final tree untouched; nano copies carry the suffix.
    assert_eq!(fs::read_to_string(fx.installed("arm-none-eabi/lib/libc.a")).unwrap(), "newlib");
    assert_eq!(
      fs::read_to_string(fx.installed("arm-none-eabi/lib/libc_nano.a")).unwrap(),
      "newlib_nano"
    );
    assert!(fx.installed("arm-none-eabi/lib/thumb/libc_nano.a").exists());
    assert!(fx.installed("arm-none-eabi/lib/libg_nano.a").exists());
    assert!(fx.installed("arm-none-eabi/lib/nano.specs").exists());
    assert_eq!(
      fs::read_to_string(fx.installed("arm-none-eabi/lib/libstdc++.a")).unwrap(),
      "gcc_newlib"
    );
    assert_eq!(
      fs::read_to_string(fx.installed("arm-none-eabi/lib/thumb/libstdc++_nano.a")).unwrap(),
      "gcc_newlib_nano"
    );

    // Partial compiler goals.
    let gcc_base = &components[1];
    assert_eq!(gcc_base.build_target().as_deref(), Some("all-gcc"));
  }

  #[tokio::test]
  async fn rerun_of_complete_toolchain_does_nothing() {
    let fx = Fixture::new();
    let tool = fake();
    let components = toolchain();
    assert!(fx.run(&tool, &components).await.succeeded());
    tool.reset();

    let report = fx.run(&tool, &components).await;

    assert!(report.succeeded());
    assert!(!report.changed);
    assert!(tool.build_invocations().is_empty());
    assert!(report.components.iter().all(|c| c.outcome == Outcome::UpToDate));
  }

  #[tokio::test]
  async fn flag_change_cascades_downstream_only() {
    let fx = Fixture::new();
    let tool = fake();
    let mut components = toolchain();
    assert!(fx.run(&tool, &components).await.succeeded());

    components[2].config = flags(&["--enable-languages=c,c++"]);
    tool.reset();
    let report = fx.run(&tool, &components).await;

    assert!(report.changed);
    assert_eq!(tool.configured(), vec!["gcc_newlib", "newlib_nano", "gcc_newlib_nano"]);
    let outcomes: Vec<_> = report.components.iter().map(|c| c.outcome).collect();
    assert_eq!(
      outcomes,
      vec![Outcome::UpToDate, Outcome::UpToDate, Outcome::Built, Outcome::Built]
    );
  }

  #[tokio::test]
  async fn docs_switch_without_doc_targets_rebuilds_nothing() {
    let mut fx = Fixture::new();
    let tool = FakeTool::new();
    let binutils = Component::new("binutils", ComponentKind::Binutils, TARGET);
    let gdb = Component::new("gdb", ComponentKind::Debugger, TARGET);
    let components = vec![binutils, gdb];
    assert!(fx.run(&tool, &components).await.succeeded());

    fx.settings.with_docs = false;
    tool.reset();
    let report = fx.run(&tool, &components).await;

    assert!(report.succeeded());
    assert!(!report.changed);
    assert!(tool.build_invocations().is_empty());
  }

  #[tokio::test]
  async fn cleanup_edit_does_not_cascade() {
    let fx = Fixture::new();
    let tool = fake();
    let mut components = toolchain();
    assert!(fx.run(&tool, &components).await.succeeded());

    components[0].cleanup = vec!["lib".to_string(), "share".to_string()];
    tool.reset();
    let report = fx.run(&tool, &components).await;

    assert!(report.changed);
    assert!(tool.build_invocations().is_empty());
    let outcomes: Vec<_> = report.components.iter().map(|c| c.outcome).collect();
    assert_eq!(
      outcomes,
      vec![Outcome::Built, Outcome::UpToDate, Outcome::UpToDate, Outcome::UpToDate]
    );
  }

  #[tokio::test]
  async fn nano_rebuild_leaves_standard_library_markers_alone() {
    let fx = Fixture::new();
    let tool = fake();
    let mut components = toolchain();
    assert!(fx.run(&tool, &components).await.succeeded());

    if let Some(nano) = components[3].library.as_deref_mut() {
      nano.config = flags(&["--enable-newlib-nano-formatted-io"]);
    }
    tool.reset();
    assert!(fx.run(&tool, &components).await.succeeded());

    assert_eq!(tool.configured(), vec!["newlib_nano", "gcc_newlib_nano"]);
    let pipeline = ToolchainPipeline::new(&tool, &fx.resolver, &fx.settings);
    let newlib = pipeline.driver(&components[2]).status().unwrap();
    assert!(newlib.is_complete());
  }

  #[tokio::test]
  async fn failure_halts_and_names_component_and_step() {
    let fx = Fixture::new();
    let tool = fake();
    let mut components = toolchain();
    components.push(Component::new("gdb", ComponentKind::Debugger, TARGET));
    tool.fail("gcc_newlib", Op::Install);

    let report = fx.run(&tool, &components).await;

    assert!(!report.succeeded());
    assert_eq!(report.failed_component.as_deref(), Some("gcc_newlib"));
    assert_eq!(report.failed_step, Some(BuildStep::Install));
    assert!(report.error.as_deref().unwrap().contains("injected install failure"));
    assert!(!tool.configured().contains(&"gdb".to_string()));
    assert_eq!(report.components[2].outcome, Outcome::Failed);
    assert_eq!(report.components[3].outcome, Outcome::NotRun);
    assert_eq!(report.components[4].outcome, Outcome::NotRun);

    // The next run resumes at the failed step.
    tool.clear_failures();
    tool.reset();
    let report = fx.run(&tool, &components).await;
    assert!(report.succeeded());
    assert_eq!(
      tool.configured(),
      vec!["newlib_nano", "gcc_newlib_nano", "gdb"]
    );
  }

  #[tokio::test]
  async fn nested_library_failure_reports_library() {
    let fx = Fixture::new();
    let tool = fake();
    let components = toolchain();
    tool.fail("newlib_nano", Op::Make);

    let report = fx.run(&tool, &components).await;

    assert_eq!(report.failed_component.as_deref(), Some("newlib_nano"));
    assert_eq!(report.failed_step, Some(BuildStep::Build));
  }
}
