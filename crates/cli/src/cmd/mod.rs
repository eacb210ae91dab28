//! Command implementations.
//!
//! Every command loads the configuration document, resolves the workspace
//! root and takes the workspace lock before touching any build state.

mod build;
mod invalidate;
mod status;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use toolsmith_lib::lock::{LockMode, WorkspaceLock};
use toolsmith_lib::{PathResolver, ToolchainConfig};
use tracing::debug;

pub use build::cmd_build;
pub use invalidate::cmd_invalidate;
pub use status::cmd_status;

/// Global options shared by every command.
pub struct Context {
  pub config: PathBuf,
  pub root: Option<PathBuf>,
  pub verbose: bool,
}

/// A loaded configuration with its locked workspace.
pub(crate) struct Workspace {
  pub config: ToolchainConfig,
  pub resolver: PathResolver,
  _lock: WorkspaceLock,
}

impl Context {
  pub(crate) fn load_config(&self) -> Result<ToolchainConfig> {
    ToolchainConfig::load(&self.config)
      .with_context(|| format!("Failed to load configuration {}", self.config.display()))
  }

  /// Loads the configuration, prepares the workspace root and locks it.
  pub(crate) fn open(&self, mode: LockMode, command: &str) -> Result<Workspace> {
    let config = self.load_config()?;
    let root = config.workspace_root(self.root.as_deref());
    let resolver = PathResolver::new(&root).with_context(|| format!("Unusable workspace {}", root.display()))?;
    let lock = WorkspaceLock::acquire(resolver.root(), mode, command)?;
    debug!(root = %root.display(), ?mode, components = config.components.len(), "workspace opened");

    Ok(Workspace {
      config,
      resolver,
      _lock: lock,
    })
  }
}

impl Workspace {
  /// Workspace root for display, without Windows verbatim prefixes.
  pub(crate) fn display_root(&self) -> String {
    let root = self.resolver.root();
    dunce::canonicalize(root)
      .unwrap_or_else(|_| root.to_path_buf())
      .display()
      .to_string()
  }
}
