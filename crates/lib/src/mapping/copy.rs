//! Glob matching, copying and removal for file mappings.
//!
//! Patterns are matched relative to a root directory. `*` never crosses a path
//! separator and never matches a leading dot; use `**` for recursive matches.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::{FileMapping, MappingError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: true,
  require_literal_leading_dot: true,
};

/// Result of [`remove_matching`]. Failures are reported rather than raised so
/// callers can treat them as warnings.
#[derive(Debug, Default)]
pub struct RemoveOutcome {
  pub removed: Vec<PathBuf>,
  pub failed: Vec<(PathBuf, io::Error)>,
}

impl RemoveOutcome {
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
  }
}

/// Matched paths plus per-entry errors (unreadable directories and the like).
type Matches = (Vec<PathBuf>, Vec<glob::GlobError>);

fn matches(root: &Path, pattern: &str) -> Result<Matches, MappingError> {
  if pattern.is_empty() {
    return Err(MappingError::InvalidPattern {
      pattern: pattern.to_string(),
      message: "pattern is empty".to_string(),
    });
  }

  let full = format!(
    "{}/{}",
    Pattern::escape(&root.to_string_lossy()),
    pattern.trim_start_matches('/')
  );
  let paths = glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| MappingError::InvalidPattern {
    pattern: pattern.to_string(),
    message: e.msg.to_string(),
  })?;

  let mut found = Vec::new();
  let mut errors = Vec::new();
  for entry in paths {
    match entry {
      Ok(path) => found.push(path),
      Err(e) => errors.push(e),
    }
  }
  found.sort();
  Ok((found, errors))
}

/// Execute one mapping: copy whatever `mapping.from` matches under `src_root`
/// to `mapping.to` under `dst_root`.
///
/// Returns the destination path written for each match.
pub fn copy(mapping: &FileMapping, src_root: &Path, dst_root: &Path) -> Result<Vec<PathBuf>, MappingError> {
  let (found, errors) = matches(src_root, &mapping.from)?;
  if let Some(e) = errors.into_iter().next() {
    let path = e.path().to_path_buf();
    return Err(MappingError::io(path, io::Error::from(e)));
  }

  if found.is_empty() {
    debug!(mapping = %mapping, root = %src_root.display(), "mapping matched nothing");
    return Ok(Vec::new());
  }

  let mut written = Vec::with_capacity(found.len());
  if mapping.is_directory_target() {
    let dest_dir = dst_root.join(&mapping.to);
    for source in &found {
      let Some(name) = source.file_name() else {
        continue;
      };
      let dest = dest_dir.join(name);
      copy_path(source, &dest)?;
      written.push(dest);
    }
  } else {
    if found.len() > 1 {
      return Err(MappingError::AmbiguousRename {
        pattern: mapping.from.clone(),
        destination: mapping.to.clone(),
        matches: found,
      });
    }
    let dest = dst_root.join(&mapping.to);
    copy_path(&found[0], &dest)?;
    written.push(dest);
  }

  debug!(mapping = %mapping, count = written.len(), "copied mapping");
  Ok(written)
}

/// Copy a file, symlink or directory tree to `dest`, creating parents and
/// overwriting existing files.
fn copy_path(source: &Path, dest: &Path) -> Result<(), MappingError> {
  for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
    let entry = entry.map_err(|e| {
      let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
      MappingError::io(path, io::Error::from(e))
    })?;

    let Ok(relative) = entry.path().strip_prefix(source) else {
      continue;
    };
    let target = if relative.as_os_str().is_empty() {
      dest.to_path_buf()
    } else {
      dest.join(relative)
    };

    let file_type = entry.file_type();
    if file_type.is_dir() {
      fs::create_dir_all(&target).map_err(|e| MappingError::io(&target, e))?;
      continue;
    }

    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).map_err(|e| MappingError::io(parent, e))?;
    }

    if file_type.is_symlink() {
      copy_symlink(entry.path(), &target)?;
    } else {
      trace!(from = %entry.path().display(), to = %target.display(), "copying file");
      fs::copy(entry.path(), &target).map_err(|e| MappingError::io(entry.path(), e))?;
    }
  }
  Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), MappingError> {
  let link = fs::read_link(source).map_err(|e| MappingError::io(source, e))?;
  match fs::remove_file(target) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(MappingError::io(target, e)),
  }
  std::os::unix::fs::symlink(&link, target).map_err(|e| MappingError::io(target, e))
}

/// Windows symlinks need privileges we can't assume, so copy the target.
#[cfg(windows)]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), MappingError> {
  fs::copy(source, target)
    .map(|_| ())
    .map_err(|e| MappingError::io(source, e))
}

/// Remove every file or directory under `root` matching `pattern`.
///
/// Paths that vanish before they can be removed are ignored; any other
/// failure is collected in [`RemoveOutcome::failed`].
pub fn remove_matching(root: &Path, pattern: &str) -> Result<RemoveOutcome, MappingError> {
  let (found, errors) = matches(root, pattern)?;
  let mut outcome = RemoveOutcome::default();

  for e in errors {
    let path = e.path().to_path_buf();
    outcome.failed.push((path, io::Error::from(e)));
  }

  for path in found {
    let is_dir = fs::symlink_metadata(&path).map(|m| m.is_dir()).unwrap_or(false);
    let result = if is_dir {
      fs::remove_dir_all(&path)
    } else {
      fs::remove_file(&path)
    };
    match result {
      Ok(()) => {
        trace!(path = %path.display(), "removed");
        outcome.removed.push(path);
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => outcome.failed.push((path, e)),
    }
  }

  Ok(outcome)
}
