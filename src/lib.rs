//! stabcheck
//!
//! Checks whether methods are type stable by enumerating the concrete
//! instantiations below their declared signatures and asking an inference
//! oracle for each result type.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod inference;
pub mod lattice;
pub mod module;
pub mod report;
pub mod types;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::engine::{
        enumerate, MethodCheckResult, MethodId, Outcome, OutcomeKind, SearchConfig,
        StabilityChecker,
    };
    pub use crate::inference::{InferenceError, InferenceOracle, RuleTable};
    pub use crate::lattice::{TypeLattice, TypeRegistry};
    pub use crate::types::{parse_signature, parse_type, Signature, Type};
}
