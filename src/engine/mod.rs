//! Lattice enumeration and stability classification.
//!
//! The engine walks the subtype lattice below a signature, feeds every
//! concrete instantiation to an inference oracle, and folds the answers
//! into an [`Outcome`]. It only talks to the host through the
//! [`TypeLattice`](crate::lattice::TypeLattice) and
//! [`InferenceOracle`](crate::inference::InferenceOracle) traits.

mod classify;
mod concrete;
mod enumerate;
mod existential;

pub use classify::{MethodCheckResult, MethodId, Outcome, OutcomeKind, StabilityChecker};
pub use concrete::{all_concrete, is_concrete, is_expected_union};
pub use enumerate::{
    direct_subtypes, enumerate, EndReason, Enumeration, Expansion, LatticeItem,
    SkippedExistentials, UNENUMERABLE_TYPES,
};
pub use existential::{expand_existential, Specialization};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Traversal settings for one search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Only yield concrete instantiations; abstract nodes are still expanded
    pub concrete_only: bool,
    /// Record every parametric component as skipped instead of expanding it
    pub skip_unbound_existentials: bool,
    /// Allow abstract types as type-variable instantiations
    pub expand_with_abstract_args: bool,
    /// Restrict module scans to exported callables
    pub exported_only: bool,
    /// Maximum number of concrete instantiations checked; config loading rejects 0
    pub fuel: usize,
    /// Maximum number of worklist pops; 0 permits none and config loading rejects it
    pub max_lattice_steps: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concrete_only: true,
            skip_unbound_existentials: false,
            expand_with_abstract_args: false,
            exported_only: false,
            fuel: 1000,
            max_lattice_steps: 1000,
        }
    }
}

impl SearchConfig {
    /// Config for the recursive enumeration of an existential's bound.
    /// Parametric components inside the bound are never expanded, which
    /// keeps the recursion one level deep.
    pub fn for_existential(&self) -> Self {
        Self {
            skip_unbound_existentials: true,
            concrete_only: !self.expand_with_abstract_args,
            ..self.clone()
        }
    }
}

/// Shared cancellation flag, checked between worklist pops
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
