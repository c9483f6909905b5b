//! # kprov CLI entry point
//!
//! Parses command-line arguments, loads the configuration and dispatches
//! to subcommand handlers. The handler's return value is the exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kprov_cli::flow::ExitStatus;
use kprov_cli::inspect::{run_inspect, InspectArgs};
use kprov_cli::load_config;
use kprov_cli::logging::verbosity_directive;
use kprov_cli::measure::{run_measure, MeasureArgs};
use kprov_cli::provision::{run_provision, ProvisionArgs};

/// Provision a client key and server certificate into a freshly loaded
/// enclave, which then retrieves its key from the key server.
#[derive(Parser, Debug)]
#[command(name = "kprov", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load an enclave and provision the client key into it.
    Provision(ProvisionArgs),

    /// Load and self-check the key and certificate without an enclave.
    Inspect(InspectArgs),

    /// Print the SHA-256 measurement of an enclave image.
    Measure(MeasureArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(ExitStatus::Usage.code());
        }
    };

    // `provision` installs its own sink from the configuration.
    if !matches!(cli.command, Commands::Provision(_)) {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(verbosity_directive(cli.verbose)))
            .with_target(false)
            .init();
    }

    let result = match &cli.command {
        Commands::Provision(args) => run_provision(args, config, cli.verbose),
        Commands::Inspect(args) => run_inspect(args, &config),
        Commands::Measure(args) => run_measure(args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(ExitStatus::Usage.code())
        }
    }
}
