//! Status command implementation.
//!
//! Reports which steps of every component are done, pending or not
//! applicable, without running anything.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use toolsmith_lib::driver::{ComponentStatus, StepState};
use toolsmith_lib::lock::LockMode;
use toolsmith_lib::tool::Autotools;
use toolsmith_lib::{BuildSettings, ComponentBuildDriver, Profile};

use super::Context;
use crate::output::{print_info, print_json, print_stat, print_success, symbols};

pub fn cmd_status(ctx: &Context, profile: Profile, json: bool) -> Result<()> {
  let workspace = ctx.open(LockMode::Shared, "toolsmith status")?;
  let config = &workspace.config;
  let settings = BuildSettings::from_config(config, profile)?;
  let tool = Autotools::default();

  let statuses = config
    .components
    .iter()
    .map(|component| ComponentBuildDriver::new(component, &tool, &workspace.resolver, &settings).status())
    .collect::<Result<Vec<_>, _>>()?;

  if json {
    let json_output = serde_json::json!({
      "workspace": workspace.resolver.root(),
      "profile": profile,
      "complete": statuses.iter().all(ComponentStatus::is_complete),
      "components": statuses,
    });
    print_json(&json_output)?;
    return Ok(());
  }

  print_info(&format!("Workspace: {}", workspace.display_root()));
  print_stat("Profile", profile.as_str());
  println!();

  for status in &statuses {
    print_component(status, 0, ctx.verbose);
  }

  println!();
  let complete = statuses.iter().filter(|s| s.is_complete()).count();
  if complete == statuses.len() {
    print_success("All components are up to date");
  } else {
    print_info(&format!("{complete} of {} component(s) complete", statuses.len()));
  }

  Ok(())
}

fn print_component(status: &ComponentStatus, depth: usize, verbose: bool) {
  let indent = "  ".repeat(depth + 1);
  let symbol = if status.is_complete() {
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string()
  } else {
    symbols::PENDING.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string()
  };
  println!(
    "{indent}{} {} {}",
    symbol,
    status.component,
    format!("({})", status.target).if_supports_color(Stream::Stdout, |s| s.dimmed())
  );

  for step in &status.steps {
    if step.state == StepState::NotApplicable && !verbose {
      continue;
    }
    let state = match step.state {
      StepState::Done => step.state.to_string().if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
      StepState::Pending => step.state.to_string().if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
      StepState::NotApplicable => step.state.to_string().if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
    };
    println!("{indent}    {:<15} {}", step.step.as_str(), state);
  }

  if verbose {
    let layout = &status.layout;
    println!("{indent}    source   {}", layout.source_dir.display());
    println!("{indent}    build    {}", layout.build_dir.display());
    println!("{indent}    install  {}", layout.install_dir.display());
    println!("{indent}    staging  {}", layout.staging_install_dir.display());
  }

  if let Some(library) = &status.library {
    print_component(library, depth + 1, verbose);
  }
}
