//! Source-to-destination file mappings.
//!
//! Build tools install files where *they* want them; packages need them where
//! *we* want them. A [`MappingTemplate`] describes a glob-style source pattern
//! and a destination, both of which may contain `{name}` placeholders.
//! [`expand`] turns templates into concrete [`FileMapping`]s once placeholder
//! values are known, and [`copy`] executes one mapping.
//!
//! # Destination forms
//!
//! - A destination ending in `/` (or empty) is a directory: every match is
//!   copied into it under its own file name.
//! - Any other destination is an exact file name: the pattern must match at
//!   most one file, otherwise [`MappingError::AmbiguousRename`] is returned
//!   before anything is copied.
//!
//! A pattern matching nothing is a no-op in both forms.
//!
//! # Submodules
//!
//! - [`template`] - placeholder parsing and rendering
//! - [`expand`] - template expansion with literal and lazy substitutions
//! - [`copy`] - glob matching, copying and removal

pub mod copy;
pub mod expand;
pub mod template;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use copy::{RemoveOutcome, copy, remove_matching};
pub use expand::{ProviderError, Substitution, Substitutions, expand};
pub use template::TemplateError;

/// An unresolved mapping; either side may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingTemplate {
  pub from: String,
  pub to: String,
}

impl MappingTemplate {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
    }
  }
}

/// A concrete mapping from a glob pattern to a destination path, both
/// relative to the roots passed to [`copy`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMapping {
  pub from: String,
  pub to: String,
}

impl FileMapping {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
    }
  }

  /// Whether the destination names a directory rather than a file.
  pub fn is_directory_target(&self) -> bool {
    self.to.is_empty() || self.to.ends_with('/') || self.to.ends_with(std::path::MAIN_SEPARATOR)
  }
}

impl std::fmt::Display for FileMapping {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} -> {}", self.from, self.to)
  }
}

/// Errors raised while expanding or executing file mappings.
#[derive(Debug, Error)]
pub enum MappingError {
  /// A file-form destination matched more than one source.
  #[error("pattern '{pattern}' matches {} files but destination '{destination}' names a single file", matches.len())]
  AmbiguousRename {
    pattern: String,
    destination: String,
    matches: Vec<PathBuf>,
  },

  #[error("invalid glob pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  #[error("invalid template '{template}': {source}")]
  Template {
    template: String,
    #[source]
    source: TemplateError,
  },

  #[error("unknown placeholder '{{{name}}}' in '{template}'")]
  UnknownPlaceholder { name: String, template: String },

  /// A lazy provider failed while computing placeholder values.
  #[error("failed to resolve placeholder '{{{name}}}': {source}")]
  Provider {
    name: String,
    #[source]
    source: ProviderError,
  },

  #[error("io error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl MappingError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    MappingError::Io {
      path: path.into(),
      source,
    }
  }
}
