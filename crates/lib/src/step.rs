//! Lifecycle steps of a single component build.
//!
//! Steps execute in the fixed order of [`BuildStep::ALL`]. Each step has a
//! deterministic marker file name inside the component's build directory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One phase of a component's lifecycle.
///
/// The derived `Ord` follows lifecycle order, so `a < b` means `a` runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStep {
  Configure,
  Build,
  BuildExtra,
  BuildDoc,
  Install,
  InstallExtra,
  InstallDoc,
  ManualInstall,
  Cleanup,
}

impl BuildStep {
  /// Every step, in execution order.
  pub const ALL: [BuildStep; 9] = [
    BuildStep::Configure,
    BuildStep::Build,
    BuildStep::BuildExtra,
    BuildStep::BuildDoc,
    BuildStep::Install,
    BuildStep::InstallExtra,
    BuildStep::InstallDoc,
    BuildStep::ManualInstall,
    BuildStep::Cleanup,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      BuildStep::Configure => "configure",
      BuildStep::Build => "build",
      BuildStep::BuildExtra => "build-extra",
      BuildStep::BuildDoc => "build-doc",
      BuildStep::Install => "install",
      BuildStep::InstallExtra => "install-extra",
      BuildStep::InstallDoc => "install-doc",
      BuildStep::ManualInstall => "manual-install",
      BuildStep::Cleanup => "cleanup",
    }
  }

  /// Name of the completion marker file for this step.
  pub fn marker_name(&self) -> &'static str {
    match self {
      BuildStep::Configure => ".configured",
      BuildStep::Build => ".built",
      BuildStep::BuildExtra => ".built-extra",
      BuildStep::BuildDoc => ".built-doc",
      BuildStep::Install => ".installed",
      BuildStep::InstallExtra => ".installed-extra",
      BuildStep::InstallDoc => ".installed-doc",
      BuildStep::ManualInstall => ".manual-installed",
      BuildStep::Cleanup => ".cleaned",
    }
  }

  fn index(self) -> usize {
    self as usize
  }

  /// The step that follows this one, or `None` for [`BuildStep::Cleanup`].
  pub fn next(self) -> Option<BuildStep> {
    Self::ALL.get(self.index() + 1).copied()
  }

  /// This step and every step after it.
  pub fn and_later(self) -> impl Iterator<Item = BuildStep> {
    Self::ALL[self.index()..].iter().copied()
  }
}

impl fmt::Display for BuildStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown build step: {0}")]
pub struct UnknownStep(pub String);

impl FromStr for BuildStep {
  type Err = UnknownStep;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .iter()
      .copied()
      .find(|step| step.as_str() == s)
      .ok_or_else(|| UnknownStep(s.to_string()))
  }
}
