//! Implementation of the `toolsmith invalidate` command.

use anyhow::{Result, bail};
use toolsmith_lib::lock::LockMode;
use toolsmith_lib::tool::Autotools;
use toolsmith_lib::{BuildSettings, BuildStep, ComponentBuildDriver};

use super::Context;
use crate::output::print_success;

/// Removes the markers of `name` from `from` onwards so the next build
/// re-runs those steps.
pub fn cmd_invalidate(ctx: &Context, name: &str, from: BuildStep) -> Result<()> {
  let workspace = ctx.open(LockMode::Exclusive, "toolsmith invalidate")?;
  let config = &workspace.config;

  let Some(component) = config.find(name) else {
    let known: Vec<&str> = config
      .components
      .iter()
      .flat_map(|c| c.with_library())
      .map(|c| c.name.as_str())
      .collect();
    bail!("Unknown component '{name}' (known: {})", known.join(", "));
  };

  // Marker locations do not depend on the profile.
  let settings = BuildSettings::from_config(config, Default::default())?;
  let tool = Autotools::default();
  ComponentBuildDriver::new(component, &tool, &workspace.resolver, &settings).invalidate_from(from)?;

  print_success(&format!("Invalidated {name} from {from}"));
  Ok(())
}
