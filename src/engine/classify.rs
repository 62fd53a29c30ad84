//! Stability classification of a method signature.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use super::concrete::{all_concrete, is_concrete};
use super::enumerate::{Enumeration, LatticeItem};
use super::{CancelToken, SearchConfig};
use crate::inference::InferenceOracle;
use crate::lattice::TypeLattice;
use crate::types::{Signature, Type};

/// Identity of one method overload, used for inference and reporting
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MethodId {
    /// Callable name
    pub name: String,
    /// Declaring scope (module)
    pub scope: String,
    /// Declared parameter types
    pub signature: Signature,
    /// Source file of the definition
    pub file: String,
    /// Source line of the definition (1-indexed, 0 when unknown)
    pub line: u32,
}

impl MethodId {
    pub fn new(name: impl Into<String>, scope: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
            signature,
            file: String::new(),
            line: 0,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    /// `name(A, B)` for a given instantiation
    pub fn call_text(&self, sig: &Signature) -> String {
        format!("{}{}", self.name, sig)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            write!(f, "{}{}", self.name, self.signature)
        } else {
            write!(f, "{}.{}{}", self.scope, self.name, self.signature)
        }
    }
}

/// Result of checking one signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Every concrete instantiation inferred to a concrete result
    Stable { steps: usize, skipped: Vec<Type> },
    /// Some concrete instantiations inferred to a non-concrete result
    Unstable {
        failing_instantiations: Vec<Signature>,
    },
    /// A parameter is the unconstrained top type
    #[serde(rename = "any_param")]
    GivesUpAnyParam { sig: Signature },
    /// A parameter is variadic
    #[serde(rename = "vararg")]
    GivesUpVararg { sig: Signature },
    /// The oracle produced nothing for this instantiation
    InferenceFailure {
        instantiation: Signature,
        reason: String,
    },
    /// Fuel or step budget ran out before the search finished
    FuelExhausted,
}

/// Discriminant of [`Outcome`], in report column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Stable,
    Unstable,
    AnyParam,
    Vararg,
    InferenceFailure,
    FuelExhausted,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 6] = [
        OutcomeKind::Stable,
        OutcomeKind::Unstable,
        OutcomeKind::AnyParam,
        OutcomeKind::Vararg,
        OutcomeKind::InferenceFailure,
        OutcomeKind::FuelExhausted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Stable => "stable",
            OutcomeKind::Unstable => "unstable",
            OutcomeKind::AnyParam => "any_param",
            OutcomeKind::Vararg => "vararg",
            OutcomeKind::InferenceFailure => "inference_failure",
            OutcomeKind::FuelExhausted => "fuel_exhausted",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Stable { .. } => OutcomeKind::Stable,
            Outcome::Unstable { .. } => OutcomeKind::Unstable,
            Outcome::GivesUpAnyParam { .. } => OutcomeKind::AnyParam,
            Outcome::GivesUpVararg { .. } => OutcomeKind::Vararg,
            Outcome::InferenceFailure { .. } => OutcomeKind::InferenceFailure,
            Outcome::FuelExhausted => OutcomeKind::FuelExhausted,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Outcome::Stable { .. })
    }

    /// Free-form diagnostic text for the report `extra` column
    pub fn extra(&self) -> String {
        match self {
            Outcome::Stable { steps, skipped } if skipped.is_empty() => format!("steps={}", steps),
            Outcome::Stable { steps, skipped } => format!(
                "steps={}; skipped: {}",
                steps,
                skipped
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            Outcome::Unstable {
                failing_instantiations,
            } => failing_instantiations
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("; "),
            Outcome::GivesUpAnyParam { sig } | Outcome::GivesUpVararg { sig } => sig.to_string(),
            Outcome::InferenceFailure {
                instantiation,
                reason,
            } => format!("{}: {}", instantiation, reason),
            Outcome::FuelExhausted => String::new(),
        }
    }
}

/// A method paired with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCheckResult {
    pub method: MethodId,
    pub outcome: Outcome,
}

/// Drives the enumerator and the inference oracle for one search config
pub struct StabilityChecker<'a> {
    lattice: &'a dyn TypeLattice,
    oracle: &'a dyn InferenceOracle,
    config: SearchConfig,
    cancel: Option<CancelToken>,
}

impl<'a> StabilityChecker<'a> {
    pub fn new(
        lattice: &'a dyn TypeLattice,
        oracle: &'a dyn InferenceOracle,
        config: SearchConfig,
    ) -> Self {
        Self {
            lattice,
            oracle,
            config,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Check a method against its own declared signature
    pub fn check(&self, method: &MethodId) -> MethodCheckResult {
        MethodCheckResult {
            method: method.clone(),
            outcome: self.classify(method, &method.signature),
        }
    }

    /// Classify `sig` for `callable`. Always returns exactly one outcome.
    pub fn classify(&self, callable: &MethodId, sig: &Signature) -> Outcome {
        if sig.iter().any(Type::is_any) {
            return Outcome::GivesUpAnyParam { sig: sig.clone() };
        }
        if sig.iter().any(Type::is_vararg) {
            return Outcome::GivesUpVararg { sig: sig.clone() };
        }

        let mut enumeration = Enumeration::new(self.lattice, sig.clone(), &self.config);
        if let Some(token) = &self.cancel {
            enumeration = enumeration.with_cancel(token.clone());
        }

        let mut checked = 0usize;
        let mut failing = Vec::new();
        let mut skipped: Vec<Type> = Vec::new();
        let mut seen_skipped: HashSet<Type> = HashSet::new();

        for item in enumeration {
            match item {
                LatticeItem::Instance(instance) => {
                    if !all_concrete(self.lattice, &instance) {
                        continue;
                    }
                    checked += 1;
                    if checked > self.config.fuel {
                        debug!(method = %callable, fuel = self.config.fuel, "fuel exhausted");
                        return Outcome::FuelExhausted;
                    }
                    match self.oracle.infer(callable, &instance) {
                        Ok(result) => {
                            if !is_concrete(self.lattice, &result) {
                                debug!(
                                    method = %callable,
                                    instance = %instance,
                                    result = %result,
                                    "non-concrete result"
                                );
                                failing.push(instance);
                            }
                        }
                        Err(err) => {
                            debug!(method = %callable, instance = %instance, %err, "inference failed");
                            return Outcome::InferenceFailure {
                                instantiation: instance,
                                reason: err.to_string(),
                            };
                        }
                    }
                }
                LatticeItem::Skipped(marker) => {
                    for ty in marker.0 {
                        if seen_skipped.insert(ty.clone()) {
                            skipped.push(ty);
                        }
                    }
                }
                LatticeItem::End(reason) => {
                    if reason.is_abort() {
                        debug!(method = %callable, ?reason, "search aborted");
                        return Outcome::FuelExhausted;
                    }
                    break;
                }
            }
        }

        if failing.is_empty() {
            Outcome::Stable {
                steps: checked,
                skipped,
            }
        } else {
            Outcome::Unstable {
                failing_instantiations: failing,
            }
        }
    }
}
