//! stabcheck CLI - type-stability checking by subtype lattice enumeration

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use stabcheck::cli::Cli;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    Ok(cli.run()?)
}
