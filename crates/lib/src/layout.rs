//! Canonical directory layout of a workspace.
//!
//! ```text
//! <root>/
//! ├── src/<source>/            # extracted source trees, shared across rebuilds
//! ├── build/<target>/<name>/   # out-of-tree build dir + step markers, one per component
//! └── install/
//!     ├── final/               # primary install root, shipped verbatim
//!     └── temp/                # staging root for artifacts promoted selectively
//! ```
//!
//! Both install roots are shared by every component of a run so their
//! artifacts compose into one tree. Build directories are keyed by target
//! triple and component name and therefore never collide.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::component::Component;

#[derive(Debug, Error)]
pub enum LayoutError {
  /// The workspace root cannot be created or written to.
  #[error("workspace root {} is not writable: {source}", path.display())]
  NotWritable {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Directories used by one component build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryLayout {
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub install_dir: PathBuf,
  pub staging_install_dir: PathBuf,
}

impl DirectoryLayout {
  /// Install root this component's `install` step writes into.
  pub fn install_root(&self, staged: bool) -> &Path {
    if staged {
      &self.staging_install_dir
    } else {
      &self.install_dir
    }
  }
}

/// Computes directory layouts below a single workspace root.
#[derive(Debug, Clone)]
pub struct PathResolver {
  root: PathBuf,
}

impl PathResolver {
  /// Creates a resolver, ensuring `root` exists and accepts new files.
  pub fn new(root: impl Into<PathBuf>) -> Result<Self, LayoutError> {
    let root = root.into();
    let not_writable = |source| LayoutError::NotWritable {
      path: root.clone(),
      source,
    };

    fs::create_dir_all(&root).map_err(not_writable)?;
    tempfile::tempfile_in(&root).map_err(not_writable)?;

    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn source_root(&self) -> PathBuf {
    self.root.join("src")
  }

  pub fn install_dir(&self) -> PathBuf {
    self.root.join("install").join("final")
  }

  pub fn staging_install_dir(&self) -> PathBuf {
    self.root.join("install").join("temp")
  }

  pub fn lock_path(&self) -> PathBuf {
    self.root.join(".lock")
  }

  /// Layout for `component` built for `target`.
  pub fn resolve(&self, component: &Component, target: &str) -> DirectoryLayout {
    let source = Path::new(component.source_name());
    let source_dir = if source.is_absolute() {
      source.to_path_buf()
    } else {
      self.source_root().join(source)
    };

    DirectoryLayout {
      source_dir,
      build_dir: self.root.join("build").join(target).join(&component.name),
      install_dir: self.install_dir(),
      staging_install_dir: self.staging_install_dir(),
    }
  }
}
