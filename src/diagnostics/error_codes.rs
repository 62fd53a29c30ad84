//! Diagnostic code definitions and documentation

/// Stability warnings (W0xxx), one per non-stable outcome
pub mod warnings {
    pub const UNSTABLE: &str = "W0001";
    pub const ANY_PARAM: &str = "W0002";
    pub const VARARG: &str = "W0003";
    pub const INFERENCE_FAILURE: &str = "W0004";
    pub const FUEL_EXHAUSTED: &str = "W0005";
}

/// Every known code, in numeric order
pub const ALL_CODES: &[&str] = &[
    warnings::UNSTABLE,
    warnings::ANY_PARAM,
    warnings::VARARG,
    warnings::INFERENCE_FAILURE,
    warnings::FUEL_EXHAUSTED,
];

/// Long-form explanation of a diagnostic code
pub fn explain(code: &str) -> Option<&'static str> {
    let explanation = match code.to_ascii_uppercase().as_str() {
        "W0001" => {
            r#"W0001: Method is not type stable

At least one concrete instantiation of the method's signature infers to a
result type that is not concrete. Callers compiled against that
instantiation cannot know the result type ahead of time.

Example:
  bump(x::Number) = x + one(x)
  # bump(::Float16) infers Union{Float16, Float32}

The diagnostic lists the failing instantiations (up to --max-shown).

Fix: make every branch return the same concrete type, or narrow the
declared parameter types.
"#
        }
        "W0002" => {
            r#"W0002: Parameter of type Any

One of the parameters is declared as `Any`. Its subtype set is the whole
lattice, so the method is not enumerated.

Fix: give the parameter a more specific declared type if the method is
meant to be checked.
"#
        }
        "W0003" => {
            r#"W0003: Variadic parameter

The signature ends in a `Vararg{...}` parameter. Variadic arity is not
enumerated, so the method is not checked.

Fix: check the fixed-arity overloads instead.
"#
        }
        "W0004" => {
            r#"W0004: Inference failed

The inference oracle produced no result type for one concrete
instantiation: no rule matched, the rule is marked as failing, or the call
timed out. The search stops at the first such instantiation.

Fix: add an inference rule covering the reported instantiation, or raise
the inference timeout.
"#
        }
        "W0005" => {
            r#"W0005: Search budget exhausted

The search ran out of fuel (concrete instantiations checked) or lattice
steps before covering the whole subtype lattice, or it was cancelled. The
method is neither proven stable nor shown unstable.

Fix: raise --fuel or --max-steps, or narrow the declared parameter types.
"#
        }
        _ => return None,
    };
    Some(explanation)
}
