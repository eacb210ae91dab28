//! Buildable units of a toolchain.
//!
//! A [`Component`] is constructed once per pipeline run from the configuration
//! document and is immutable afterwards. Drivers derive injected flags and
//! environment from it without mutating it.
//!
//! # Submodules
//!
//! - [`profile`] - build profiles and profile-dependent values

pub mod profile;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mapping::MappingTemplate;
pub use profile::{Profile, Profiled};

/// What a component is, which decides the configure flags the driver injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
  /// Assembler, linker and binary utilities.
  Binutils,
  /// A compiler stage, optionally building a library variant first.
  Compiler,
  /// A C runtime library, usually nested in a compiler stage.
  Library,
  /// The debugger.
  Debugger,
}

impl ComponentKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ComponentKind::Binutils => "binutils",
      ComponentKind::Compiler => "compiler",
      ComponentKind::Library => "library",
      ComponentKind::Debugger => "debugger",
    }
  }
}

impl std::fmt::Display for ComponentKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Make goals and extra arguments for each lifecycle step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Targets {
  /// Primary build goal; `None` runs the tool's default goal.
  pub build: Option<String>,
  pub build_args: Vec<String>,
  pub extra: Vec<String>,
  pub doc: Vec<String>,
  /// Primary install goal; `None` means `install` (or `install-gcc` for a partial compiler).
  pub install: Option<String>,
  pub install_args: Vec<String>,
  pub extra_install: Vec<String>,
  pub doc_install: Vec<String>,
  pub doc_install_args: Vec<String>,
}

/// One buildable unit of the toolchain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Component {
  pub name: String,
  pub kind: ComponentKind,
  /// Target triple; filled from the document's default when omitted.
  #[serde(default)]
  pub target: String,
  /// Source tree name under `<root>/src`, or an absolute path. Defaults to `name`.
  #[serde(default)]
  pub source: Option<String>,
  #[serde(default)]
  pub config: Profiled<Vec<String>>,
  /// Compiler flags exported as `CXXFLAGS` to the build.
  #[serde(default)]
  pub build_options: Profiled<Vec<String>>,
  #[serde(default)]
  pub env: Profiled<BTreeMap<String, String>>,
  #[serde(default)]
  pub skip_docs: bool,
  /// Compiler only: `false` builds just the compiler proper (`all-gcc`).
  #[serde(default = "default_true")]
  pub full_build: bool,
  /// Install into the staging root and promote `target_files` afterwards.
  #[serde(default)]
  pub staged: bool,
  #[serde(default)]
  pub targets: Targets,
  /// Staging-root to install-root promotions, applied when `staged`.
  #[serde(default)]
  pub target_files: BTreeMap<String, String>,
  /// Build-tree to install-root copies.
  #[serde(default)]
  pub extra_files: BTreeMap<String, String>,
  /// Install-tree paths (globs allowed) removed after installation.
  #[serde(default)]
  pub cleanup: Vec<String>,
  #[serde(default)]
  pub library: Option<Box<LibraryVariant>>,
}

/// A secondary runtime library build owned by a compiler stage.
///
/// It has the same shape as a component (own flags, environment, file
/// mappings) and is built to completion before its owner's own steps.
pub type LibraryVariant = Component;

fn default_true() -> bool {
  true
}

impl Component {
  /// Creates a component with default settings.
  pub fn new(name: impl Into<String>, kind: ComponentKind, target: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      kind,
      target: target.into(),
      source: None,
      config: Profiled::default(),
      build_options: Profiled::default(),
      env: Profiled::default(),
      skip_docs: false,
      full_build: true,
      staged: false,
      targets: Targets::default(),
      target_files: BTreeMap::new(),
      extra_files: BTreeMap::new(),
      cleanup: Vec::new(),
      library: None,
    }
  }

  /// Name of the source tree this component builds from.
  pub fn source_name(&self) -> &str {
    self.source.as_deref().unwrap_or(&self.name)
  }

  /// Whether this is a compiler stage that only builds the compiler proper.
  pub fn is_partial_compiler(&self) -> bool {
    self.kind == ComponentKind::Compiler && !self.full_build
  }

  pub fn build_target(&self) -> Option<String> {
    match &self.targets.build {
      Some(target) => Some(target.clone()),
      None if self.is_partial_compiler() => Some("all-gcc".to_string()),
      None => None,
    }
  }

  pub fn install_target(&self) -> String {
    match &self.targets.install {
      Some(target) => target.clone(),
      None if self.is_partial_compiler() => "install-gcc".to_string(),
      None => "install".to_string(),
    }
  }

  /// Whether documentation steps apply under the global docs switch.
  pub fn docs_enabled(&self, with_docs: bool) -> bool {
    with_docs && !self.skip_docs
  }

  pub fn target_file_templates(&self) -> Vec<MappingTemplate> {
    to_templates(&self.target_files)
  }

  pub fn extra_file_templates(&self) -> Vec<MappingTemplate> {
    to_templates(&self.extra_files)
  }

  /// This component followed by its nested library variant, if any.
  pub fn with_library(&self) -> impl Iterator<Item = &Component> {
    std::iter::once(self).chain(self.library.as_deref())
  }
}

fn to_templates(map: &BTreeMap<String, String>) -> Vec<MappingTemplate> {
  map
    .iter()
    .map(|(from, to)| MappingTemplate::new(from.clone(), to.clone()))
    .collect()
}
