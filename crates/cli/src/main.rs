mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use toolsmith_lib::{BuildStep, Profile};
use tracing_subscriber::EnvFilter;

use toolsmith_lib::consts::DEFAULT_CONFIG;

/// toolsmith - staged cross toolchain builder
#[derive(Parser)]
#[command(name = "toolsmith")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the toolchain configuration
  #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
  config: PathBuf,

  /// Workspace root (overrides the configuration and TOOLSMITH_ROOT)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every component in order, skipping completed steps
  Build {
    /// Build profile
    #[arg(long, default_value_t = Profile::Release)]
    profile: Profile,

    /// Skip documentation steps
    #[arg(long)]
    no_docs: bool,

    /// Parallel make jobs (defaults to the configuration, then CPU count)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print the build report as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show per-step state of every component
  Status {
    /// Build profile
    #[arg(long, default_value_t = Profile::Release)]
    profile: Profile,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Forget completed steps of a component so they run again
  Invalidate {
    /// Component or library variant name
    component: String,

    /// First step to forget
    #[arg(long, default_value_t = BuildStep::Configure)]
    from: BuildStep,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let ctx = cmd::Context {
    config: cli.config,
    root: cli.root,
    verbose: cli.verbose,
  };

  let result = match cli.command {
    Commands::Build {
      profile,
      no_docs,
      jobs,
      json,
    } => cmd::cmd_build(&ctx, profile, no_docs, jobs, json),
    Commands::Status { profile, json } => cmd::cmd_status(&ctx, profile, json).map(|()| true),
    Commands::Invalidate { component, from } => cmd::cmd_invalidate(&ctx, &component, from).map(|()| true),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(err) => {
      output::print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
