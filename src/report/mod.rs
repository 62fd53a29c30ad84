//! CSV and JSON reports for a batch of classification results.
//!
//! Two files per run: `<label>-detailed.csv` with one row per checked
//! method, and `<label>-aggregate.csv` with one counter row per scope.

use miette::Diagnostic;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::engine::{MethodCheckResult, OutcomeKind};

/// Header of the detailed CSV, in column order
pub const DETAILED_HEADER: [&str; 6] = [
    "outcome_kind",
    "extra",
    "signature_text",
    "scope_text",
    "source_file",
    "source_line",
];

/// Header of the aggregate CSV, in column order
pub const AGGREGATE_HEADER: [&str; 8] = [
    "scope",
    "total",
    "stable",
    "unstable",
    "any_param",
    "vararg",
    "inference_failure",
    "fuel_exhausted",
];

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("failed to write report {path}: {message}")]
    #[diagnostic(code(stabcheck::report::io))]
    Io { path: String, message: String },

    #[error("failed to serialize report: {0}")]
    #[diagnostic(code(stabcheck::report::json))]
    Json(#[from] serde_json::Error),
}

/// One row of the detailed report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedRecord {
    pub outcome_kind: OutcomeKind,
    pub extra: String,
    pub signature_text: String,
    pub scope_text: String,
    pub source_file: String,
    pub source_line: u32,
}

impl DetailedRecord {
    pub fn from_result(result: &MethodCheckResult) -> Self {
        let method = &result.method;
        Self {
            outcome_kind: result.outcome.kind(),
            extra: result.outcome.extra(),
            signature_text: method.call_text(&method.signature),
            scope_text: method.scope.clone(),
            source_file: method.file.clone(),
            source_line: method.line,
        }
    }

    fn fields(&self) -> [String; 6] {
        [
            self.outcome_kind.as_str().to_string(),
            self.extra.clone(),
            self.signature_text.clone(),
            self.scope_text.clone(),
            self.source_file.clone(),
            self.source_line.to_string(),
        ]
    }
}

/// Outcome counters of one scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeSummary {
    pub scope: String,
    pub total: usize,
    pub stable: usize,
    pub unstable: usize,
    pub any_param: usize,
    pub vararg: usize,
    pub inference_failure: usize,
    pub fuel_exhausted: usize,
}

impl ScopeSummary {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Count one outcome
    pub fn add(&mut self, kind: OutcomeKind) {
        self.total += 1;
        let counter = match kind {
            OutcomeKind::Stable => &mut self.stable,
            OutcomeKind::Unstable => &mut self.unstable,
            OutcomeKind::AnyParam => &mut self.any_param,
            OutcomeKind::Vararg => &mut self.vararg,
            OutcomeKind::InferenceFailure => &mut self.inference_failure,
            OutcomeKind::FuelExhausted => &mut self.fuel_exhausted,
        };
        *counter += 1;
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Stable => self.stable,
            OutcomeKind::Unstable => self.unstable,
            OutcomeKind::AnyParam => self.any_param,
            OutcomeKind::Vararg => self.vararg,
            OutcomeKind::InferenceFailure => self.inference_failure,
            OutcomeKind::FuelExhausted => self.fuel_exhausted,
        }
    }

    fn fields(&self) -> [String; 8] {
        [
            self.scope.clone(),
            self.total.to_string(),
            self.stable.to_string(),
            self.unstable.to_string(),
            self.any_param.to_string(),
            self.vararg.to_string(),
            self.inference_failure.to_string(),
            self.fuel_exhausted.to_string(),
        ]
    }
}

/// Summarize the results of one scope
pub fn summarize(scope: &str, results: &[MethodCheckResult]) -> ScopeSummary {
    let mut summary = ScopeSummary::new(scope);
    for result in results {
        summary.add(result.outcome.kind());
    }
    summary
}

/// Results of one scanned scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeResults {
    pub scope: String,
    pub results: Vec<MethodCheckResult>,
}

impl ScopeResults {
    pub fn summary(&self) -> ScopeSummary {
        summarize(&self.scope, &self.results)
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

/// Detailed CSV text, header included
pub fn detailed_csv(scopes: &[ScopeResults]) -> String {
    let mut out = csv_row(&DETAILED_HEADER[..]);
    for scope in scopes {
        for result in &scope.results {
            out.push_str(&csv_row(&DetailedRecord::from_result(result).fields()[..]));
        }
    }
    out
}

/// Aggregate CSV text, header included
pub fn aggregate_csv(scopes: &[ScopeResults]) -> String {
    let mut out = csv_row(&AGGREGATE_HEADER[..]);
    for scope in scopes {
        out.push_str(&csv_row(&scope.summary().fields()[..]));
    }
    out
}

/// Paths written by [`write_reports`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub detailed: PathBuf,
    pub aggregate: PathBuf,
}

/// Write `<label>-detailed.csv` and `<label>-aggregate.csv` into `dir`
pub fn write_reports(
    dir: &Path,
    label: &str,
    scopes: &[ScopeResults],
) -> Result<ReportPaths, ReportError> {
    let paths = ReportPaths {
        detailed: dir.join(format!("{}-detailed.csv", label)),
        aggregate: dir.join(format!("{}-aggregate.csv", label)),
    };
    write_file(&paths.detailed, &detailed_csv(scopes))?;
    write_file(&paths.aggregate, &aggregate_csv(scopes))?;
    info!(
        detailed = %paths.detailed.display(),
        aggregate = %paths.aggregate.display(),
        "reports written"
    );
    Ok(paths)
}

fn write_file(path: &Path, content: &str) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }
    std::fs::write(path, content).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, e: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    scopes: Vec<JsonScope<'a>>,
}

#[derive(Serialize)]
struct JsonScope<'a> {
    summary: ScopeSummary,
    results: &'a [MethodCheckResult],
}

/// Pretty JSON with per-scope summaries and every result
pub fn to_json(scopes: &[ScopeResults]) -> Result<String, ReportError> {
    let report = JsonReport {
        scopes: scopes
            .iter()
            .map(|s| JsonScope {
                summary: s.summary(),
                results: &s.results,
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests;
