//! Handler for the `stabcheck check` subcommand.

use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::diagnostics::DiagnosticBag;
use crate::engine::{MethodCheckResult, MethodId};
use crate::inference::{InferenceOracle, RuleTable, TimeoutOracle};
use crate::lattice::{TypeLattice, TypeRegistry};
use crate::module::{self, BatchChecker, ModuleFile};
use crate::report::{self, ReportPaths, ScopeResults};

use super::{CheckArgs, CliError};

/// Everything one check run produced
#[derive(Debug, Clone)]
pub struct CheckRun {
    /// Results per scanned module, in discovery order
    pub scopes: Vec<ScopeResults>,

    /// Generic overloads that were listed but not analyzed
    pub generic: Vec<MethodId>,

    /// CSV reports, when requested
    pub reports: Option<ReportPaths>,
}

impl CheckRun {
    pub fn results(&self) -> impl Iterator<Item = &MethodCheckResult> {
        self.scopes.iter().flat_map(|s| s.results.iter())
    }

    pub fn method_count(&self) -> usize {
        self.scopes.iter().map(|s| s.results.len()).sum()
    }

    pub fn all_stable(&self) -> bool {
        self.results().all(|r| r.outcome.is_stable())
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.all_stable() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        }
    }

    /// One-line summary, e.g. `Checked 6 method(s) in 1 module(s): 2 stable, 1 unstable, 3 not checked`
    pub fn summary_line(&self) -> String {
        let total = self.method_count();
        let stable = self.results().filter(|r| r.outcome.is_stable()).count();
        let unstable = self
            .results()
            .filter(|r| matches!(r.outcome, crate::engine::Outcome::Unstable { .. }))
            .count();
        format!(
            "Checked {} method(s) in {} module(s): {} stable, {} unstable, {} not checked",
            total,
            self.scopes.len(),
            stable,
            unstable,
            total - stable - unstable
        )
    }
}

/// Load the lattice and modules named by `config`, classify every
/// scanned method and write the CSV reports when enabled
pub fn run_check(config: &Config, filter: Option<&Regex>) -> Result<CheckRun, CliError> {
    let lattice: Arc<dyn TypeLattice> = Arc::new(TypeRegistry::load(&config.lattice)?);

    let files = module::discover(&config.modules)?;
    let mut modules = Vec::with_capacity(files.len());
    for path in &files {
        debug!(path = %path.display(), "loading module");
        modules.push(ModuleFile::load(path)?.resolve()?);
    }

    let mut table = RuleTable::new(Arc::clone(&lattice));
    for scanned in &modules {
        scanned.install_rules(&mut table);
    }
    let table = Arc::new(table);
    let oracle: Box<dyn InferenceOracle> = if config.run.inference_timeout_ms > 0 {
        Box::new(TimeoutOracle::new(
            table,
            Duration::from_millis(config.run.inference_timeout_ms),
        ))
    } else {
        Box::new(table)
    };

    let checker = BatchChecker::new(lattice.as_ref(), oracle.as_ref(), config.search.clone())
        .jobs(config.run.jobs);

    let mut scopes = Vec::with_capacity(modules.len());
    let mut generic = Vec::new();
    for scanned in &modules {
        let pending = module::scan(scanned, &config.search, filter);
        let results = checker.check(pending);
        generic.extend(module::set_aside(scanned, &config.search, filter));
        scopes.push(ScopeResults {
            scope: scanned.scope.clone(),
            results,
        });
    }

    let reports = if config.report.csv {
        Some(report::write_reports(
            &config.report.output_dir,
            &config.report.label,
            &scopes,
        )?)
    } else {
        None
    };

    let run = CheckRun {
        scopes,
        generic,
        reports,
    };
    info!(
        modules = run.scopes.len(),
        methods = run.method_count(),
        generic = run.generic.len(),
        "check finished"
    );
    Ok(run)
}

pub(super) fn run_check_command(
    args: &CheckArgs,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, CliError> {
    let config = args.resolve_config()?;
    let filter = args.filter.as_deref().map(Regex::new).transpose()?;
    let run = run_check(&config, filter.as_ref())?;
    print_run(&run, config.report.max_shown, json, quiet)?;
    Ok(run.exit_code())
}

fn print_run(run: &CheckRun, max_shown: usize, json: bool, quiet: bool) -> Result<(), CliError> {
    if json {
        println!("{}", report::to_json(&run.scopes)?);
        return Ok(());
    }

    let bag = DiagnosticBag::from_results(run.results(), max_shown);
    if !bag.is_empty() {
        eprintln!("{}", bag.format_text());
    }
    if quiet {
        return Ok(());
    }
    for method in &run.generic {
        println!("note: generic method {} not analyzed", method);
    }
    if let Some(paths) = &run.reports {
        println!(
            "Reports written to {} and {}",
            paths.detailed.display(),
            paths.aggregate.display()
        );
    }
    println!("{}", run.summary_line());
    Ok(())
}

/// Paths whose changes trigger a re-check
fn watched_paths(args: &CheckArgs, config: &Config) -> Vec<PathBuf> {
    let config_file = args
        .config
        .clone()
        .or_else(|| Config::find(Path::new(".")));
    let mut paths: Vec<PathBuf> = config_file
        .into_iter()
        .chain(std::iter::once(config.lattice.clone()))
        .chain(config.modules.iter().cloned())
        .filter(|p| p.exists())
        .map(|p| {
            if p.is_file() {
                p.parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            } else {
                p
            }
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// File names of the CSV reports a run writes; changes to them never
/// trigger a re-check
pub(super) fn report_file_names(config: &Config) -> Vec<OsString> {
    if !config.report.csv {
        return Vec::new();
    }
    let label = &config.report.label;
    vec![
        OsString::from(format!("{}-detailed.csv", label)),
        OsString::from(format!("{}-aggregate.csv", label)),
    ]
}

/// Does this watcher event touch an input?
pub(super) fn triggers_recheck(event: &notify::Event, ignored: &[OsString]) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
        return false;
    }
    event.paths.is_empty()
        || event.paths.iter().any(|path| {
            path.file_name()
                .map_or(true, |name| !ignored.iter().any(|report| report == name))
        })
}

/// Run `stabcheck check` in watch mode -- re-check on file changes.
pub(super) fn run_watch_check(
    args: &CheckArgs,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, CliError> {
    use notify::{Config as WatchConfig, RecommendedWatcher, RecursiveMode, Watcher};
    use std::sync::mpsc;

    let config = args.resolve_config()?;
    println!("Watching for changes... (Ctrl+C to stop)\n");
    if let Err(e) = run_check_command(args, json, quiet) {
        eprintln!("error: {}", e);
    }

    let ignored = report_file_names(&config);
    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if triggers_recheck(&event, &ignored) {
                    let _ = tx.send(());
                }
            }
        },
        WatchConfig::default().with_poll_interval(Duration::from_millis(100)),
    )?;

    for path in watched_paths(args, &config) {
        debug!(path = %path.display(), "watching");
        watcher.watch(&path, RecursiveMode::Recursive)?;
    }

    while rx.recv().is_ok() {
        // Debounce: drain events until 200ms of quiet
        while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

        print!("\x1B[2J\x1B[H");
        println!("Input changed, re-checking...\n");
        if let Err(e) = run_check_command(args, json, quiet) {
            eprintln!("error: {}", e);
        }
        println!("\nWatching for changes... (Ctrl+C to stop)");
    }
    Ok(ExitCode::SUCCESS)
}
