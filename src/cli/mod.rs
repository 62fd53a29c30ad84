//! Command-line interface for stabcheck
//!
//! Provides commands: check, explain, enumerate

mod check_cmd;
mod enumerate_cmd;
mod explain_cmd;

pub use check_cmd::{run_check, CheckRun};

use clap::{Args, Parser, Subcommand};
use miette::Diagnostic;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::lattice::LatticeError;
use crate::module::ModuleError;
use crate::report::ReportError;
use crate::types::TypeParseError;

/// stabcheck - type-stability checking by subtype lattice enumeration
#[derive(Parser, Debug)]
#[command(name = "stabcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check every method declared in the given module files
    Check(CheckArgs),

    /// Explain a diagnostic code in detail
    Explain {
        /// Diagnostic code to explain (e.g., W0001)
        code: String,
    },

    /// Print the lattice enumeration below a signature
    Enumerate(EnumerateArgs),
}

/// Flags of `stabcheck check`; each one overrides the config file
#[derive(Args, Debug, Default, Clone)]
pub struct CheckArgs {
    /// Module files or directories (defaults to the configured modules)
    pub modules: Vec<PathBuf>,

    /// Lattice declaration file
    #[arg(long)]
    pub lattice: Option<PathBuf>,

    /// Config file (defaults to the nearest stabcheck.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum concrete instantiations checked per method
    #[arg(long, value_parser = parse_budget)]
    pub fuel: Option<usize>,

    /// Maximum lattice steps per enumeration
    #[arg(long, value_parser = parse_budget)]
    pub max_steps: Option<usize>,

    /// Only check exported callables
    #[arg(long)]
    pub exported_only: bool,

    /// Record parametric types as skipped instead of expanding them
    #[arg(long)]
    pub skip_unbound: bool,

    /// Allow abstract types as type-variable instantiations
    #[arg(long)]
    pub abstract_args: bool,

    /// Also visit abstract intermediate instantiations
    #[arg(long)]
    pub all_levels: bool,

    /// Only check callables whose name matches this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Concurrent classifications
    #[arg(long, short)]
    pub jobs: Option<usize>,

    /// Write CSV reports
    #[arg(long)]
    pub csv: bool,

    /// Prefix of the CSV report files
    #[arg(long)]
    pub label: Option<String>,

    /// Directory for the CSV reports
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Failing instantiations listed per unstable method
    #[arg(long)]
    pub max_shown: Option<usize>,

    /// Watch the inputs and re-check on changes
    #[arg(long)]
    pub watch: bool,
}

impl CheckArgs {
    /// Load the config named by `--config`, or the nearest one, and apply
    /// the flags on top of it
    pub fn resolve_config(&self) -> Result<Config, CliError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::discover(std::path::Path::new("."))?,
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// Overwrite config values with the flags that were given
    pub fn apply(&self, config: &mut Config) {
        if !self.modules.is_empty() {
            config.modules = self.modules.clone();
        }
        if let Some(lattice) = &self.lattice {
            config.lattice = lattice.clone();
        }
        if let Some(fuel) = self.fuel {
            config.search.fuel = fuel;
        }
        if let Some(steps) = self.max_steps {
            config.search.max_lattice_steps = steps;
        }
        if self.exported_only {
            config.search.exported_only = true;
        }
        if self.skip_unbound {
            config.search.skip_unbound_existentials = true;
        }
        if self.abstract_args {
            config.search.expand_with_abstract_args = true;
        }
        if self.all_levels {
            config.search.concrete_only = false;
        }
        if let Some(jobs) = self.jobs {
            config.run.jobs = jobs;
        }
        if self.csv {
            config.report.csv = true;
        }
        if let Some(label) = &self.label {
            config.report.label = label.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.report.output_dir = dir.clone();
        }
        if let Some(max_shown) = self.max_shown {
            config.report.max_shown = max_shown;
        }
    }
}

/// Flags of `stabcheck enumerate`
#[derive(Args, Debug, Clone)]
pub struct EnumerateArgs {
    /// Lattice declaration file
    #[arg(long)]
    pub lattice: PathBuf,

    /// Parameter types of the signature
    #[arg(required = true)]
    pub types: Vec<String>,

    /// Also print abstract intermediate instantiations
    #[arg(long)]
    pub all_levels: bool,

    /// Record parametric types as skipped instead of expanding them
    #[arg(long)]
    pub skip_unbound: bool,

    /// Allow abstract types as type-variable instantiations
    #[arg(long)]
    pub abstract_args: bool,

    /// Maximum lattice steps
    #[arg(long, default_value_t = 1000, value_parser = parse_budget)]
    pub max_steps: usize,
}

/// A step or fuel budget; zero would check nothing
fn parse_budget(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Failures that stop a command before any method is classified
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lattice(#[from] LatticeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Report(#[from] ReportError),

    #[error("invalid signature: {0}")]
    #[diagnostic(code(stabcheck::cli::signature))]
    Signature(#[from] TypeParseError),

    #[error("invalid --filter: {0}")]
    #[diagnostic(code(stabcheck::cli::filter))]
    Filter(#[from] regex::Error),

    #[error("file watcher failed: {0}")]
    #[diagnostic(code(stabcheck::cli::watch))]
    Watch(#[from] notify::Error),

    #[error("unknown diagnostic code `{0}`")]
    #[diagnostic(
        code(stabcheck::cli::unknown_code),
        help("valid codes are W0001 through W0005")
    )]
    UnknownCode(String),
}

impl Cli {
    /// Run the parsed command; the exit code reflects the check outcome
    pub fn run(self) -> Result<ExitCode, CliError> {
        match self.command {
            Command::Check(args) => {
                if args.watch {
                    check_cmd::run_watch_check(&args, self.json, self.quiet)
                } else {
                    check_cmd::run_check_command(&args, self.json, self.quiet)
                }
            }
            Command::Explain { code } => explain_cmd::run_explain(&code),
            Command::Enumerate(args) => enumerate_cmd::run_enumerate(&args, self.json),
        }
    }
}
