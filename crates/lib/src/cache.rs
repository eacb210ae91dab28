//! Per-component step completion cache.
//!
//! A [`StepCache`] persists one marker file per completed [`BuildStep`] inside
//! the component's build directory. Presence of a marker means the step
//! completed successfully under the inputs recorded in its content.
//!
//! # Fingerprints
//!
//! Each step may carry a fingerprint of the inputs it consumes. Markers store
//! it as their content and [`StepCache::has`] only accepts markers whose
//! content matches, so a change in one step's inputs makes that step look
//! incomplete while earlier steps stay done.
//!
//! # Cascading invalidation
//!
//! [`StepCache::invalidate_from`] removes the marker of a step and of every
//! step after it in lifecycle order. Drivers call it whenever a step actually
//! executes, so later steps can never reuse artifacts of a stale earlier step.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::step::BuildStep;

#[derive(Debug, Clone)]
pub struct StepCache {
  dir: PathBuf,
  fingerprints: BTreeMap<BuildStep, String>,
}

impl StepCache {
  /// Creates a cache storing markers in `dir`.
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      fingerprints: BTreeMap::new(),
    }
  }

  /// Binds the markers of every step to one input fingerprint.
  pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
    let fingerprint = fingerprint.into();
    for step in BuildStep::ALL {
      self.fingerprints.insert(step, fingerprint.clone());
    }
    self
  }

  /// Binds the marker of `step` to the fingerprint of its own inputs.
  pub fn with_step_fingerprint(mut self, step: BuildStep, fingerprint: impl Into<String>) -> Self {
    self.fingerprints.insert(step, fingerprint.into());
    self
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn fingerprint(&self, step: BuildStep) -> Option<&str> {
    self.fingerprints.get(&step).map(String::as_str)
  }

  pub fn marker_path(&self, step: BuildStep) -> PathBuf {
    self.dir.join(step.marker_name())
  }

  /// Returns true if `step` completed under its current fingerprint.
  pub fn has(&self, step: BuildStep) -> bool {
    match std::fs::read_to_string(self.marker_path(step)) {
      Ok(content) => match self.fingerprint(step) {
        Some(expected) => content.trim() == expected,
        None => true,
      },
      Err(_) => false,
    }
  }

  /// Records `step` as completed.
  pub fn mark(&self, step: BuildStep) -> io::Result<()> {
    std::fs::create_dir_all(&self.dir)?;
    let content = self.fingerprint(step).unwrap_or_default();
    std::fs::write(self.marker_path(step), content)?;
    debug!(step = %step, dir = %self.dir.display(), "step marked complete");
    Ok(())
  }

  /// Removes the markers of `step` and of every later step.
  pub fn invalidate_from(&self, step: BuildStep) -> io::Result<()> {
    for later in step.and_later() {
      match std::fs::remove_file(self.marker_path(later)) {
        Ok(()) => debug!(step = %later, "marker invalidated"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
      }
    }
    Ok(())
  }

  /// Steps whose markers are currently valid, in lifecycle order.
  pub fn completed(&self) -> Vec<BuildStep> {
    BuildStep::ALL.into_iter().filter(|step| self.has(*step)).collect()
  }

  /// Runs `action` unless `step` has already completed.
  ///
  /// Returns whether the action executed. The marker is written only after
  /// the action succeeds; an error from the action propagates unchanged and
  /// leaves the step incomplete so the next run retries it.
  pub async fn run_if_needed<F, Fut, E>(&self, step: BuildStep, action: F) -> Result<bool, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: From<io::Error>,
  {
    if self.has(step) {
      debug!(step = %step, "step already complete, skipping");
      return Ok(false);
    }

    action().await?;
    self.mark(step)?;
    Ok(true)
  }
}
