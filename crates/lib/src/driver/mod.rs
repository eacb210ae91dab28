//! Lifecycle driver for a single component.
//!
//! [`ComponentBuildDriver::build`] walks the component through every
//! applicable [`BuildStep`] in order. Each step is gated by the component's
//! [`StepCache`]; a step that actually executes invalidates every step after
//! it, so nothing downstream of a re-run step is ever reused.
//!
//! Markers carry a fingerprint of the inputs their step consumes. Flags,
//! environment, source and make goals gate `configure` through
//! `install-extra`; the documentation switch and doc goals gate the doc steps;
//! file mappings and runtime files gate `manual-install`; the cleanup list
//! gates `cleanup`. An edit re-runs the component from the first step whose
//! inputs changed.
//!
//! A compiler stage that owns a [`LibraryVariant`](crate::component::LibraryVariant)
//! builds the variant to completion first, through its own driver and its
//! own build directory. If the variant changed, the owner re-runs from
//! `configure`.
//!
//! # Submodules
//!
//! - [`flags`] - configure flags and tool environment

pub mod flags;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::cache::StepCache;
use crate::component::{Component, ComponentKind, Profile};
use crate::config::{ConfigError, ToolchainConfig};
use crate::layout::{DirectoryLayout, PathResolver};
use crate::mapping::{self, FileMapping, MappingError, MappingTemplate, ProviderError, Substitutions};
use crate::step::BuildStep;
use crate::tool::multilib::multilib_lib_dir;
use crate::tool::{BuildHandle, BuildTool, ToolEnv, ToolError};
use crate::util::hash::{HashError, Hashable};
use flags::FlagContext;

/// Run-wide settings shared by every driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
  pub profile: Profile,
  /// Global documentation switch.
  pub with_docs: bool,
  pub host_triple: String,
  pub pkg_version: Option<String>,
  /// Files copied into `<install>/bin` during `manual-install`.
  pub runtime_files: Vec<PathBuf>,
  /// Compiler driver name queried for multilib directories.
  pub compiler: String,
}

impl BuildSettings {
  pub fn new(host_triple: impl Into<String>) -> Self {
    Self {
      profile: Profile::default(),
      with_docs: true,
      host_triple: host_triple.into(),
      pkg_version: None,
      runtime_files: Vec::new(),
      compiler: "gcc".to_string(),
    }
  }

  pub fn from_config(config: &ToolchainConfig, profile: Profile) -> Result<Self, ConfigError> {
    Ok(Self {
      profile,
      with_docs: config.with_docs,
      host_triple: config.host_triple()?,
      pkg_version: config.pkg_version.clone(),
      runtime_files: config.runtime_files.clone(),
      compiler: config.compiler.clone(),
    })
  }

  fn flag_context(&self) -> FlagContext<'_> {
    FlagContext {
      host: &self.host_triple,
      pkg_version: self.pkg_version.as_deref(),
    }
  }
}

/// Why a single step failed.
#[derive(Debug, Error)]
pub enum StepError {
  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error(transparent)]
  Mapping(#[from] MappingError),

  #[error("io error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to update step markers: {0}")]
  Marker(#[from] io::Error),

  #[error("failed to fingerprint inputs: {0}")]
  Fingerprint(#[from] HashError),
}

impl StepError {
  fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    StepError::Io {
      path: path.into(),
      source,
    }
  }
}

/// A component build failed at `step`.
#[derive(Debug, Error)]
#[error("{component} failed at {step}: {source}")]
pub struct DriverError {
  pub component: String,
  pub step: BuildStep,
  #[source]
  pub source: StepError,
}

/// State of one step as reported by [`ComponentBuildDriver::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepState {
  Done,
  Pending,
  #[serde(rename = "n/a")]
  NotApplicable,
}

impl fmt::Display for StepState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      StepState::Done => "done",
      StepState::Pending => "pending",
      StepState::NotApplicable => "n/a",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
  pub step: BuildStep,
  pub state: StepState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
  pub component: String,
  pub target: String,
  pub layout: DirectoryLayout,
  pub steps: Vec<StepStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub library: Option<Box<ComponentStatus>>,
}

impl ComponentStatus {
  /// Whether every applicable step (library included) is done.
  pub fn is_complete(&self) -> bool {
    self.steps.iter().all(|s| s.state != StepState::Pending)
      && self.library.as_ref().is_none_or(|l| l.is_complete())
  }
}

/// What one component build did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOutcome {
  /// Some step executed, here or in the nested library variant.
  pub changed: bool,
  /// A step that shapes what later components build against executed.
  pub rebuilt: bool,
}

/// Documentation and cleanup only tidy the install tree; nothing downstream
/// consumes them.
fn rebuilds_downstream(step: BuildStep) -> bool {
  !matches!(step, BuildStep::BuildDoc | BuildStep::InstallDoc | BuildStep::Cleanup)
}

/// Inputs of `configure`, the build steps and the install steps.
#[derive(Serialize)]
struct BuildInputs<'a> {
  name: &'a str,
  kind: ComponentKind,
  target: &'a str,
  source_dir: &'a Path,
  flags: &'a [String],
  env: &'a ToolEnv,
  full_build: bool,
  staged: bool,
  build: Option<&'a str>,
  build_args: &'a [String],
  extra: &'a [String],
  install: Option<&'a str>,
  install_args: &'a [String],
  extra_install: &'a [String],
}

impl Hashable for BuildInputs<'_> {}

#[derive(Serialize)]
struct DocInputs<'a> {
  docs: bool,
  doc: &'a [String],
  doc_install: &'a [String],
  doc_install_args: &'a [String],
}

impl Hashable for DocInputs<'_> {}

#[derive(Serialize)]
struct MappingInputs<'a> {
  staged: bool,
  target_files: &'a BTreeMap<String, String>,
  extra_files: &'a BTreeMap<String, String>,
  runtime_files: &'a [PathBuf],
}

impl Hashable for MappingInputs<'_> {}

#[derive(Serialize)]
struct CleanupInputs<'a> {
  cleanup: &'a [String],
}

impl Hashable for CleanupInputs<'_> {}

/// Values computed once per `build()` and shared by every step.
struct StepContext {
  layout: DirectoryLayout,
  handle: BuildHandle,
  flags: Vec<String>,
  env: ToolEnv,
}

/// Drives one component (and its nested library variant) through its lifecycle.
pub struct ComponentBuildDriver<'a, T> {
  component: &'a Component,
  tool: &'a T,
  resolver: &'a PathResolver,
  settings: &'a BuildSettings,
  upstream_changed: bool,
}

impl<'a, T: BuildTool> ComponentBuildDriver<'a, T> {
  pub fn new(component: &'a Component, tool: &'a T, resolver: &'a PathResolver, settings: &'a BuildSettings) -> Self {
    Self {
      component,
      tool,
      resolver,
      settings,
      upstream_changed: false,
    }
  }

  /// Marks an earlier component as changed: every marker is discarded
  /// before building.
  pub fn with_upstream_changed(mut self, changed: bool) -> Self {
    self.upstream_changed = changed;
    self
  }

  pub fn component(&self) -> &Component {
    self.component
  }

  pub fn layout(&self) -> DirectoryLayout {
    self.resolver.resolve(self.component, &self.component.target)
  }

  fn error(&self, step: BuildStep, source: impl Into<StepError>) -> DriverError {
    DriverError {
      component: self.component.name.clone(),
      step,
      source: source.into(),
    }
  }

  fn context(&self) -> StepContext {
    let layout = self.layout();
    let flags = flags::configure_flags(self.component, self.settings.profile, &layout, self.settings.flag_context());
    let inherited_path = std::env::var("PATH").ok();
    let env = flags::tool_env(self.component, self.settings.profile, &layout, inherited_path.as_deref());
    let handle = BuildHandle {
      component: self.component.name.clone(),
      source_dir: layout.source_dir.clone(),
      build_dir: layout.build_dir.clone(),
    };
    StepContext {
      layout,
      handle,
      flags,
      env,
    }
  }

  fn docs_enabled(&self) -> bool {
    self.component.docs_enabled(self.settings.with_docs)
  }

  /// Marker cache bound to the component's current input fingerprint.
  pub fn cache(&self) -> Result<StepCache, DriverError> {
    let ctx = self.context();
    self.fingerprinted_cache(&ctx)
  }

  fn fingerprinted_cache(&self, ctx: &StepContext) -> Result<StepCache, DriverError> {
    let component = self.component;
    let targets = &component.targets;
    // PATH is left out: it depends on the invoking shell, not on the component.
    let env = flags::component_env(component, self.settings.profile);
    let build = BuildInputs {
      name: &component.name,
      kind: component.kind,
      target: &component.target,
      source_dir: &ctx.layout.source_dir,
      flags: &ctx.flags,
      env: &env,
      full_build: component.full_build,
      staged: component.staged,
      build: targets.build.as_deref(),
      build_args: &targets.build_args,
      extra: &targets.extra,
      install: targets.install.as_deref(),
      install_args: &targets.install_args,
      extra_install: &targets.extra_install,
    }
    .compute_hash()
    .map_err(|e| self.error(BuildStep::Configure, e))?;
    let docs = DocInputs {
      docs: self.docs_enabled(),
      doc: &targets.doc,
      doc_install: &targets.doc_install,
      doc_install_args: &targets.doc_install_args,
    }
    .compute_hash()
    .map_err(|e| self.error(BuildStep::BuildDoc, e))?;
    let mappings = MappingInputs {
      staged: component.staged,
      target_files: &component.target_files,
      extra_files: &component.extra_files,
      runtime_files: &self.settings.runtime_files,
    }
    .compute_hash()
    .map_err(|e| self.error(BuildStep::ManualInstall, e))?;
    let cleanup = CleanupInputs {
      cleanup: &component.cleanup,
    }
    .compute_hash()
    .map_err(|e| self.error(BuildStep::Cleanup, e))?;
    debug!(
      component = %component.name,
      build = build.short(),
      docs = docs.short(),
      mappings = mappings.short(),
      cleanup = cleanup.short(),
      "computed input fingerprints"
    );

    Ok(
      StepCache::new(&ctx.layout.build_dir)
        .with_fingerprint(build.0)
        .with_step_fingerprint(BuildStep::BuildDoc, docs.0.clone())
        .with_step_fingerprint(BuildStep::InstallDoc, docs.0)
        .with_step_fingerprint(BuildStep::ManualInstall, mappings.0)
        .with_step_fingerprint(BuildStep::Cleanup, cleanup.0),
    )
  }

  /// Whether `step` has anything to do for this component.
  pub fn applies(&self, step: BuildStep) -> bool {
    let c = self.component;
    match step {
      BuildStep::Configure | BuildStep::Build | BuildStep::Install => true,
      BuildStep::BuildExtra => !c.targets.extra.is_empty(),
      BuildStep::InstallExtra => !c.targets.extra_install.is_empty(),
      BuildStep::BuildDoc => self.docs_enabled() && !c.targets.doc.is_empty(),
      BuildStep::InstallDoc => self.docs_enabled() && !c.targets.doc_install.is_empty(),
      BuildStep::ManualInstall => c.staged || !c.extra_files.is_empty() || !self.settings.runtime_files.is_empty(),
      BuildStep::Cleanup => !c.cleanup.is_empty(),
    }
  }

  /// Builds the component. Returns whether any step executed, here or in
  /// the nested library variant.
  pub async fn build(&self) -> Result<bool, DriverError> {
    Ok(self.run().await?.changed)
  }

  /// Builds the component and reports whether later components must rebuild.
  pub async fn run(&self) -> Result<BuildOutcome, DriverError> {
    let span = info_span!("component", name = %self.component.name, target = %self.component.target);
    self.run_inner().instrument(span).await
  }

  async fn run_inner(&self) -> Result<BuildOutcome, DriverError> {
    let ctx = self.context();
    let cache = self.fingerprinted_cache(&ctx)?;
    let mut outcome = BuildOutcome::default();

    if self.upstream_changed {
      debug!("upstream changed, discarding markers");
      cache
        .invalidate_from(BuildStep::Configure)
        .map_err(|e| self.error(BuildStep::Configure, e))?;
    }

    if let Some(library) = self.component.library.as_deref() {
      let child = ComponentBuildDriver::new(library, self.tool, self.resolver, self.settings)
        .with_upstream_changed(self.upstream_changed);
      // Errors from the library keep the library's own name and step.
      let library_outcome = Box::pin(child.run()).await?;
      if library_outcome.rebuilt {
        info!(library = %library.name, "library variant rebuilt, reconfiguring");
        cache
          .invalidate_from(BuildStep::Configure)
          .map_err(|e| self.error(BuildStep::Configure, e))?;
      }
      outcome.changed |= library_outcome.changed;
    }

    for step in BuildStep::ALL {
      if !self.applies(step) {
        continue;
      }

      let ran = cache
        .run_if_needed(step, || async {
          info!(step = %step, "running step");
          self.execute(step, &ctx).await
        })
        .await
        .map_err(|source| {
          error!(step = %step, error = %source, "step failed");
          self.error(step, source)
        })?;

      if ran {
        outcome.changed = true;
        outcome.rebuilt |= rebuilds_downstream(step);
        if let Some(next) = step.next() {
          cache.invalidate_from(next).map_err(|e| self.error(step, e))?;
        }
      } else {
        info!(step = %step, "step up to date");
      }
    }

    Ok(outcome)
  }

  async fn execute(&self, step: BuildStep, ctx: &StepContext) -> Result<(), StepError> {
    let c = self.component;
    let targets = &c.targets;
    let install_root = ctx.layout.install_root(c.staged);

    match step {
      BuildStep::Configure => self.configure(ctx).await,
      BuildStep::Build => {
        let target = c.build_target();
        self
          .tool
          .make(&ctx.handle, target.as_deref(), &targets.build_args, &ctx.env)
          .await?;
        Ok(())
      }
      BuildStep::BuildExtra => self.make_each(ctx, &targets.extra).await,
      BuildStep::BuildDoc => self.make_each(ctx, &targets.doc).await,
      BuildStep::Install => {
        self
          .tool
          .install(&ctx.handle, &c.install_target(), install_root, &targets.install_args, &ctx.env)
          .await?;
        Ok(())
      }
      BuildStep::InstallExtra => {
        for goal in &targets.extra_install {
          self.tool.install(&ctx.handle, goal, install_root, &[], &ctx.env).await?;
        }
        Ok(())
      }
      BuildStep::InstallDoc => {
        for goal in &targets.doc_install {
          self
            .tool
            .install(&ctx.handle, goal, install_root, &targets.doc_install_args, &ctx.env)
            .await?;
        }
        Ok(())
      }
      BuildStep::ManualInstall => self.manual_install(ctx).await,
      BuildStep::Cleanup => {
        self.cleanup(ctx).await;
        Ok(())
      }
    }
  }

  async fn make_each(&self, ctx: &StepContext, goals: &[String]) -> Result<(), StepError> {
    for goal in goals {
      self.tool.make(&ctx.handle, Some(goal), &[], &ctx.env).await?;
    }
    Ok(())
  }

  async fn configure(&self, ctx: &StepContext) -> Result<(), StepError> {
    let build_dir = &ctx.layout.build_dir;
    match std::fs::remove_dir_all(build_dir) {
      Ok(()) => debug!(dir = %build_dir.display(), "cleared build directory"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(StepError::io(build_dir, e)),
    }
    std::fs::create_dir_all(build_dir).map_err(|e| StepError::io(build_dir, e))?;

    if self.component.kind == ComponentKind::Compiler {
      link_sysroot_usr(&ctx.layout.install_dir, &self.component.target)?;
    }

    debug!(flags = ?ctx.flags, "configure flags");
    self
      .tool
      .configure(
        &self.component.name,
        &ctx.layout.source_dir,
        build_dir,
        &ctx.flags,
        &ctx.env,
      )
      .await?;
    Ok(())
  }

  /// Placeholder bindings for this component's templates.
  fn substitutions(&self, layout: &DirectoryLayout) -> Substitutions<'_> {
    let target = self.component.target.clone();
    let compiler = layout
      .install_dir
      .join("bin")
      .join(format!("{}-{}", self.component.target, self.settings.compiler));
    let tool = self.tool;

    Substitutions::new()
      .literal("target", target.clone())
      .lazy("multilib_dir", move || async move {
        let fragments = tool
          .query_multilib_dirs(&compiler)
          .await
          .map_err(ProviderError::from)?;
        Ok::<_, ProviderError>(fragments.iter().map(|f| multilib_lib_dir(&target, f)).collect())
      })
  }

  async fn expand(&self, templates: &[MappingTemplate], layout: &DirectoryLayout) -> Result<Vec<FileMapping>, MappingError> {
    if templates.is_empty() {
      return Ok(Vec::new());
    }
    mapping::expand(templates, self.substitutions(layout)).await
  }

  async fn manual_install(&self, ctx: &StepContext) -> Result<(), StepError> {
    let layout = &ctx.layout;

    if self.component.staged {
      let promotions = self.expand(&self.component.target_file_templates(), layout).await?;
      for m in &promotions {
        mapping::copy(m, &layout.staging_install_dir, &layout.install_dir)?;
      }
      debug!(count = promotions.len(), "promoted staged files");
    }

    let extras = self.expand(&self.component.extra_file_templates(), layout).await?;
    for m in &extras {
      mapping::copy(m, &layout.build_dir, &layout.install_dir)?;
    }

    if !self.settings.runtime_files.is_empty() {
      let bin = layout.install_dir.join("bin");
      std::fs::create_dir_all(&bin).map_err(|e| StepError::io(&bin, e))?;
      for file in &self.settings.runtime_files {
        let Some(name) = file.file_name() else {
          continue;
        };
        std::fs::copy(file, bin.join(name)).map_err(|e| StepError::io(file, e))?;
      }
    }

    Ok(())
  }

  /// Removes shipped-by-accident files from the final tree. Never fails.
  async fn cleanup(&self, ctx: &StepContext) {
    let templates: Vec<_> = self
      .component
      .cleanup
      .iter()
      .map(|pattern| MappingTemplate::new(pattern.clone(), ""))
      .collect();

    let patterns = match self.expand(&templates, &ctx.layout).await {
      Ok(expanded) => expanded,
      Err(e) => {
        warn!(error = %e, "cleanup patterns could not be expanded, skipping cleanup");
        return;
      }
    };

    for pattern in patterns {
      match mapping::remove_matching(&ctx.layout.install_dir, &pattern.from) {
        Ok(outcome) => {
          for (path, e) in &outcome.failed {
            warn!(path = %path.display(), error = %e, "failed to remove build byproduct");
          }
          if !outcome.removed.is_empty() {
            debug!(pattern = %pattern.from, count = outcome.removed.len(), "removed build byproducts");
          }
        }
        Err(e) => warn!(pattern = %pattern.from, error = %e, "invalid cleanup pattern"),
      }
    }
  }

  /// Per-step state without running anything.
  pub fn status(&self) -> Result<ComponentStatus, DriverError> {
    let ctx = self.context();
    let cache = self.fingerprinted_cache(&ctx)?;

    let steps = BuildStep::ALL
      .into_iter()
      .map(|step| StepStatus {
        step,
        state: if !self.applies(step) {
          StepState::NotApplicable
        } else if cache.has(step) {
          StepState::Done
        } else {
          StepState::Pending
        },
      })
      .collect();

    let library = match self.component.library.as_deref() {
      Some(library) => Some(Box::new(
        ComponentBuildDriver::new(library, self.tool, self.resolver, self.settings).status()?,
      )),
      None => None,
    };

    Ok(ComponentStatus {
      component: self.component.name.clone(),
      target: self.component.target.clone(),
      layout: ctx.layout,
      steps,
      library,
    })
  }

  /// Removes this component's markers from `step` onwards, regardless of
  /// fingerprint.
  pub fn invalidate_from(&self, step: BuildStep) -> Result<(), DriverError> {
    let layout = self.layout();
    StepCache::new(&layout.build_dir)
      .invalidate_from(step)
      .map_err(|e| self.error(step, e))?;
    info!(component = %self.component.name, step = %step, "invalidated markers");
    Ok(())
  }
}

/// Points `<root>/<target>/usr` at `<root>` so sysroot `usr/` paths stay
/// inside the tree.
fn link_sysroot_usr(root: &Path, target: &str) -> Result<(), StepError> {
  let sysroot = root.join(target);
  std::fs::create_dir_all(&sysroot).map_err(|e| StepError::io(&sysroot, e))?;

  let usr = sysroot.join("usr");
  if let Ok(meta) = std::fs::symlink_metadata(&usr) {
    let removed = if meta.file_type().is_symlink() || meta.is_file() {
      remove_link(&usr)
    } else {
      std::fs::remove_dir_all(&usr)
    };
    removed.map_err(|e| StepError::io(&usr, e))?;
  }

  create_dir_link(root, &usr).map_err(|e| StepError::io(&usr, e))?;
  debug!(link = %usr.display(), to = %root.display(), "linked sysroot usr");
  Ok(())
}

#[cfg(unix)]
fn create_dir_link(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_dir_link(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn remove_link(link: &Path) -> io::Result<()> {
  std::fs::remove_file(link)
}

// Directory symlinks on Windows are removed like directories.
#[cfg(windows)]
fn remove_link(link: &Path) -> io::Result<()> {
  std::fs::remove_dir(link).or_else(|_| std::fs::remove_file(link))
}
