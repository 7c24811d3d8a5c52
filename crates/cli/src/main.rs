//! statecap CLI - Main Entry Point
//!
//! Exit codes: 0 success, 1 scenario failed (or artifacts differ, or a
//! scenario file is invalid), 2 the harness itself could not run.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use statecap_cli::commands::{check, compare, config, run};
use statecap_cli::output::{self, OutputFormat};
use statecap_common::{HarnessConfig, DEFAULT_CONFIG_FILE};

/// statecap - deterministic UI state capture
#[derive(Parser)]
#[command(name = "statecap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file
    #[arg(long, env = "STATECAP_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and capture its artifact
    Run(run::RunArgs),

    /// Validate scenario files without launching a browser
    Check(check::CheckArgs),

    /// Compare two artifacts
    Compare(compare::CompareArgs),

    /// Manage the harness configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match dispatch(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            2
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run(args) => {
            let config = HarnessConfig::load(&cli.config)?;
            run::execute(args, config, cli.format).await
        }
        Commands::Check(args) => check::execute(args, cli.format),
        Commands::Compare(args) => compare::execute(args, cli.format),
        Commands::Config(cmd) => config::execute(cmd, &cli.config, cli.format),
    }
}
