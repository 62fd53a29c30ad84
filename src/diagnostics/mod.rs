//! Console diagnostics for stability results
//!
//! Each non-stable outcome becomes a warning with a stable code, a source
//! location, and notes. Output is human-readable or JSON.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod error_codes;
pub use error_codes::*;

use crate::engine::{MethodCheckResult, Outcome, OutcomeKind};

/// Default number of failing instantiations listed per unstable method
pub const DEFAULT_MAX_SHOWN: usize = 5;

/// Where a method is defined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Source file path
    pub file: PathBuf,

    /// Line (1-indexed, 0 when unknown)
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// Severity level for diagnostics. Every non-stable outcome is a warning;
/// the exit status carries the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
}

/// An additional note attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub message: String,
}

impl Note {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A stability diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code (e.g., "W0001")
    pub code: String,

    pub severity: Severity,

    /// Primary message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

/// Code reported for an outcome kind; `None` for stable methods
pub fn code_for(kind: OutcomeKind) -> Option<&'static str> {
    match kind {
        OutcomeKind::Stable => None,
        OutcomeKind::Unstable => Some(warnings::UNSTABLE),
        OutcomeKind::AnyParam => Some(warnings::ANY_PARAM),
        OutcomeKind::Vararg => Some(warnings::VARARG),
        OutcomeKind::InferenceFailure => Some(warnings::INFERENCE_FAILURE),
        OutcomeKind::FuelExhausted => Some(warnings::FUEL_EXHAUSTED),
    }
}

impl Diagnostic {
    pub fn warning(code: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Warning)
    }

    /// Warning for a non-stable result; `None` when the method is stable.
    /// Unstable methods list at most `max_shown` failing instantiations.
    pub fn from_result(result: &MethodCheckResult, max_shown: usize) -> Option<Diagnostic> {
        let code = code_for(result.outcome.kind())?;
        let method = &result.method;
        let mut builder = Diagnostic::warning(code);
        if !method.file.is_empty() {
            builder = builder.location(Location::new(&method.file, method.line));
        }

        let diagnostic = match &result.outcome {
            Outcome::Stable { .. } => return None,
            Outcome::Unstable {
                failing_instantiations,
            } => {
                let count = failing_instantiations.len();
                builder = builder.message(format!(
                    "{} is not type stable ({} failing instantiation{})",
                    method,
                    count,
                    if count == 1 { "" } else { "s" }
                ));
                for sig in failing_instantiations.iter().take(max_shown) {
                    builder = builder.note(Note::new(format!(
                        "unstable for {}",
                        method.call_text(sig)
                    )));
                }
                if count > max_shown {
                    builder = builder.note(Note::new(format!("...and {} more", count - max_shown)));
                }
                builder.build()
            }
            Outcome::GivesUpAnyParam { sig } => builder
                .message(format!("{} not checked: parameter of type Any in {}", method, sig))
                .build(),
            Outcome::GivesUpVararg { sig } => builder
                .message(format!("{} not checked: variadic parameter in {}", method, sig))
                .build(),
            Outcome::InferenceFailure {
                instantiation,
                reason,
            } => builder
                .message(format!(
                    "{} not checked: inference failed for {}: {}",
                    method,
                    method.call_text(instantiation),
                    reason
                ))
                .build(),
            Outcome::FuelExhausted => builder
                .message(format!("{} not checked: search budget exhausted", method))
                .build(),
        };
        Some(diagnostic)
    }

    /// Format as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format as human-readable text
    pub fn to_human_readable(&self) -> String {
        let severity = match self.severity {
            Severity::Warning => "warning",
        };

        let mut output = format!("{}[{}]: {}\n", severity, self.code, self.message);
        if let Some(location) = &self.location {
            if location.line > 0 {
                output.push_str(&format!(
                    "  --> {}:{}\n",
                    location.file.display(),
                    location.line
                ));
            } else {
                output.push_str(&format!("  --> {}\n", location.file.display()));
            }
        }
        for note in &self.notes {
            output.push_str(&format!("   = note: {}\n", note.message));
        }
        output
    }
}

/// Builder for constructing diagnostics
pub struct DiagnosticBuilder {
    code: String,
    severity: Severity,
    message: String,
    location: Option<Location>,
    notes: Vec<Note>,
}

impl DiagnosticBuilder {
    fn new(code: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.into(),
            severity,
            message: String::new(),
            location: None,
            notes: Vec::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn build(self) -> Diagnostic {
        Diagnostic {
            code: self.code,
            severity: self.severity,
            message: self.message,
            location: self.location,
            notes: self.notes,
        }
    }
}

/// A collection of diagnostics
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics for every non-stable result, in order
    pub fn from_results<'a>(
        results: impl IntoIterator<Item = &'a MethodCheckResult>,
        max_shown: usize,
    ) -> Self {
        let mut bag = Self::new();
        for result in results {
            if let Some(diagnostic) = Diagnostic::from_result(result, max_shown) {
                bag.push(diagnostic);
            }
        }
        bag
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Format all diagnostics as a JSON array
    pub fn to_json(&self) -> String {
        let json_array: Vec<String> = self.diagnostics.iter().map(|d| d.to_json()).collect();
        format!("[{}]", json_array.join(","))
    }

    /// Format all diagnostics as human-readable text
    pub fn format_text(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.to_human_readable())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
