//! Implementation of the `toolsmith build` command.

use std::time::Instant;

use anyhow::{Context as _, Result};
use owo_colors::{OwoColorize, Stream};
use toolsmith_lib::lock::LockMode;
use toolsmith_lib::pipeline::{BuildReport, Outcome};
use toolsmith_lib::tool::Autotools;
use toolsmith_lib::{BuildSettings, Profile, ToolchainPipeline};

use super::Context;
use crate::output::{format_duration, print_error, print_info, print_json, print_stat, print_success, symbols};

/// Runs the pipeline. Returns whether every component succeeded.
pub fn cmd_build(ctx: &Context, profile: Profile, no_docs: bool, jobs: Option<usize>, json: bool) -> Result<bool> {
  let workspace = ctx.open(LockMode::Exclusive, "toolsmith build")?;
  let config = &workspace.config;

  let mut settings = BuildSettings::from_config(config, profile)?;
  if no_docs {
    settings.with_docs = false;
  }
  let tool = Autotools::new(jobs.unwrap_or_else(|| config.jobs()));

  if !json {
    print_info(&format!(
      "Building {} component(s) for {} ({})",
      config.components.len(),
      config.target,
      profile
    ));
    print_stat("Workspace", &workspace.display_root());
    print_stat("Jobs", &tool.jobs().to_string());
    println!();
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let pipeline = ToolchainPipeline::new(&tool, &workspace.resolver, &settings);
  let started = Instant::now();
  let report = rt.block_on(pipeline.run(&config.components));

  if json {
    print_json(&report)?;
  } else {
    print_report(&report);
    print_stat("Elapsed", &format_duration(started.elapsed()));
  }

  Ok(report.succeeded())
}

fn print_report(report: &BuildReport) {
  for entry in &report.components {
    let symbol = match entry.outcome {
      Outcome::Built => symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
      Outcome::UpToDate => symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()).to_string(),
      Outcome::Failed => symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
      Outcome::NotRun => symbols::SKIPPED.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
    };
    println!(
      "  {} {} {}",
      symbol,
      entry.component,
      format!("({}, {})", entry.target, entry.outcome).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
  println!();

  match (&report.failed_component, report.failed_step) {
    (Some(component), Some(step)) => {
      print_error(&format!("Build failed: {component} at {step}"));
      if let Some(error) = &report.error {
        eprintln!("{error}");
      }
    }
    (Some(component), None) => print_error(&format!("Build failed: {component}")),
    _ if report.changed => print_success("Toolchain built"),
    _ => print_success("Toolchain up to date"),
  }
}
