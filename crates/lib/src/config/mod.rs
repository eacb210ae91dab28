//! The toolchain configuration document.
//!
//! A single TOML file describes the target, global switches and the ordered
//! component list. It is parsed once, validated, and then treated as
//! immutable input to the pipeline.
//!
//! # Example
//!
//! ```toml
//! target = "arm-none-eabi"
//! pkg_version = "GNU Toolchain 14.2.0"
//!
//! [[components]]
//! name = "binutils"
//! kind = "binutils"
//! source = "binutils-2.43"
//! config = ["--disable-nls"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::component::{Component, ComponentKind};
use crate::platform::arch::Arch;
use crate::platform::{self, paths};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {origin}: {source}")]
  Parse {
    origin: String,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

fn default_true() -> bool {
  true
}

fn default_compiler() -> String {
  "gcc".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
  /// Default target triple for every component.
  pub target: String,
  #[serde(default)]
  pub pkg_version: Option<String>,
  #[serde(default = "default_true")]
  pub with_docs: bool,
  #[serde(default)]
  pub jobs: Option<usize>,
  /// Overrides the detected host triple.
  #[serde(default)]
  pub host: Option<String>,
  /// Compiler driver name; the built compiler is `bin/<target>-<compiler>`.
  #[serde(default = "default_compiler")]
  pub compiler: String,
  #[serde(default)]
  pub workspace: Option<PathBuf>,
  /// Files copied next to installed binaries (e.g. an msys runtime dll).
  #[serde(default)]
  pub runtime_files: Vec<PathBuf>,
  #[serde(default)]
  pub components: Vec<Component>,
}

impl ToolchainConfig {
  /// Reads, parses and validates a document. A relative `workspace` is
  /// resolved against the document's directory.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config = Self::parse(&text, &path.display().to_string())?;

    if let Some(workspace) = &config.workspace
      && workspace.is_relative()
    {
      let base = path.parent().unwrap_or_else(|| Path::new("."));
      config.workspace = Some(base.join(workspace));
    }

    debug!(path = %path.display(), components = config.components.len(), "loaded configuration");
    Ok(config)
  }

  pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
    Self::parse(text, "<inline>")
  }

  fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
    let mut config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
      origin: origin.to_string(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Fills inherited targets and checks the document's invariants.
  fn validate(&mut self) -> Result<(), ConfigError> {
    if self.target.trim().is_empty() {
      return Err(ConfigError::Invalid("target must not be empty".to_string()));
    }
    if !is_dir_segment(&self.target) {
      return Err(ConfigError::Invalid(format!(
        "invalid target '{}' (use letters, digits, '.', '_' or '-')",
        self.target
      )));
    }

    let default_target = self.target.clone();
    let mut seen = BTreeSet::new();

    for component in &mut self.components {
      check_component(component, &default_target, &mut seen)?;

      if let Some(library) = component.library.as_deref_mut() {
        if component.kind != ComponentKind::Compiler {
          return Err(ConfigError::Invalid(format!(
            "component '{}' is a {} and cannot nest a library",
            component.name, component.kind
          )));
        }
        if library.kind != ComponentKind::Library {
          return Err(ConfigError::Invalid(format!(
            "nested library '{}' must have kind \"library\"",
            library.name
          )));
        }
        if library.library.is_some() {
          return Err(ConfigError::Invalid(format!(
            "library '{}' cannot nest another library",
            library.name
          )));
        }
        if library.target.is_empty() {
          library.target = component.target.clone();
        }
        check_component(library, &default_target, &mut seen)?;
      }
    }

    Ok(())
  }

  /// Finds a component or nested library by name.
  pub fn find(&self, name: &str) -> Option<&Component> {
    self
      .components
      .iter()
      .flat_map(Component::with_library)
      .find(|c| c.name == name)
  }

  /// The configured host triple, or the detected one.
  pub fn host_triple(&self) -> Result<String, ConfigError> {
    match &self.host {
      Some(host) => {
        if Arch::from_triple(host).is_none() {
          warn!(host = %host, "host triple names an unrecognised cpu");
        }
        Ok(host.clone())
      }
      None => platform::host_triple().ok_or_else(|| {
        ConfigError::Invalid("unsupported host platform; set `host` in the configuration".to_string())
      }),
    }
  }

  /// Parallel make jobs, defaulting to the available CPUs.
  pub fn jobs(&self) -> usize {
    self
      .jobs
      .unwrap_or_else(|| std::thread::available_parallelism().map(usize::from).unwrap_or(1))
  }

  /// Workspace root: the explicit override, then the document, then the
  /// environment/default location.
  pub fn workspace_root(&self, override_root: Option<&Path>) -> PathBuf {
    override_root
      .map(Path::to_path_buf)
      .or_else(|| self.workspace.clone())
      .unwrap_or_else(paths::workspace_dir)
  }
}

fn check_component(
  component: &mut Component,
  default_target: &str,
  seen: &mut BTreeSet<(String, String)>,
) -> Result<(), ConfigError> {
  if !is_dir_segment(&component.name) {
    return Err(ConfigError::Invalid(format!(
      "invalid component name '{}' (use letters, digits, '.', '_' or '-')",
      component.name
    )));
  }

  if component.target.is_empty() {
    component.target = default_target.to_string();
  }
  if !is_dir_segment(&component.target) {
    return Err(ConfigError::Invalid(format!(
      "component '{}' has invalid target '{}'",
      component.name, component.target
    )));
  }

  if !component.target_files.is_empty() && !component.staged {
    return Err(ConfigError::Invalid(format!(
      "component '{}' declares target_files but is not staged",
      component.name
    )));
  }

  if !seen.insert((component.name.clone(), component.target.clone())) {
    return Err(ConfigError::Invalid(format!(
      "component '{}' for target '{}' is declared twice",
      component.name, component.target
    )));
  }

  Ok(())
}

/// Names and targets become directories under `build/`; they must stay a
/// single real segment.
fn is_dir_segment(value: &str) -> bool {
  !value.is_empty()
    && value != "."
    && value != ".."
    && value
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
