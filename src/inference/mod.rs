//! Inference oracle abstraction.
//!
//! The engine never infers return types itself. It asks an
//! [`InferenceOracle`] for the inferred result of a callable applied to one
//! concrete instantiation. [`RuleTable`] answers from per-callable rules
//! declared in module files; [`TimeoutOracle`] bounds any oracle with a
//! deadline; [`FnOracle`] adapts a closure.

use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{trace, warn};

use crate::engine::MethodId;
use crate::lattice::TypeLattice;
use crate::types::{Signature, Type};

/// Why the oracle could not produce a result type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("no inference rule matches {0}")]
    NoMatchingRule(Signature),
    #[error("inference failed: {0}")]
    Failed(String),
    #[error("inference timed out after {0:?}")]
    TimedOut(Duration),
    #[error("unknown callable `{0}`")]
    UnknownCallable(String),
    #[error("inference worker disconnected")]
    Disconnected,
}

/// Inferred result type of a callable for one instantiation
pub trait InferenceOracle: Send + Sync {
    fn infer(&self, callable: &MethodId, sig: &Signature) -> Result<Type, InferenceError>;
}

impl<T: InferenceOracle + ?Sized> InferenceOracle for Arc<T> {
    fn infer(&self, callable: &MethodId, sig: &Signature) -> Result<Type, InferenceError> {
        (**self).infer(callable, sig)
    }
}

impl<T: InferenceOracle + ?Sized> InferenceOracle for &T {
    fn infer(&self, callable: &MethodId, sig: &Signature) -> Result<Type, InferenceError> {
        (**self).infer(callable, sig)
    }
}

/// Closure adapter
pub struct FnOracle<F>(pub F);

impl<F> InferenceOracle for FnOracle<F>
where
    F: Fn(&MethodId, &Signature) -> Result<Type, InferenceError> + Send + Sync,
{
    fn infer(&self, callable: &MethodId, sig: &Signature) -> Result<Type, InferenceError> {
        (self.0)(callable, sig)
    }
}

/// Result side of an inference rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    /// Result template; `$N` is replaced by the N-th argument type
    Type(Type),
    /// Inference fails with this reason
    Fails(String),
}

/// One `args -> result` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRule {
    pub args: Signature,
    pub result: RuleResult,
}

impl InferenceRule {
    pub fn returns(args: Signature, result: Type) -> Self {
        Self {
            args,
            result: RuleResult::Type(result),
        }
    }

    pub fn fails(args: Signature, reason: impl Into<String>) -> Self {
        Self {
            args,
            result: RuleResult::Fails(reason.into()),
        }
    }

    /// Highest `$N` placeholder the result template refers to
    pub fn max_placeholder(&self) -> usize {
        match &self.result {
            RuleResult::Type(ty) => ty
                .free_vars()
                .iter()
                .filter_map(|v| Type::Var(v.clone()).placeholder_index())
                .max()
                .unwrap_or(0),
            RuleResult::Fails(_) => 0,
        }
    }
}

/// Rule-based oracle. Rules are tried in declaration order and the first
/// rule whose patterns all admit the instantiation wins.
pub struct RuleTable {
    lattice: Arc<dyn TypeLattice>,
    rules: HashMap<(String, String), Vec<InferenceRule>>,
}

impl RuleTable {
    pub fn new(lattice: Arc<dyn TypeLattice>) -> Self {
        Self {
            lattice,
            rules: HashMap::new(),
        }
    }

    /// Append a rule for `scope.name`
    pub fn add_rule(&mut self, scope: &str, name: &str, rule: InferenceRule) {
        self.rules
            .entry((scope.to_string(), name.to_string()))
            .or_default()
            .push(rule);
    }

    /// Move every rule of `other` into this table, after existing ones
    pub fn extend(&mut self, other: RuleTable) {
        for (key, rules) in other.rules {
            self.rules.entry(key).or_default().extend(rules);
        }
    }

    pub fn rules_for(&self, scope: &str, name: &str) -> &[InferenceRule] {
        self.rules
            .get(&(scope.to_string(), name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn matches(&self, rule: &InferenceRule, sig: &Signature) -> bool {
        rule.args.len() == sig.len()
            && sig
                .iter()
                .zip(&rule.args)
                .all(|(actual, pattern)| self.lattice.is_subtype(actual, pattern))
    }
}

impl InferenceOracle for RuleTable {
    fn infer(&self, callable: &MethodId, sig: &Signature) -> Result<Type, InferenceError> {
        let Some(rules) = self
            .rules
            .get(&(callable.scope.clone(), callable.name.clone()))
        else {
            return Err(InferenceError::UnknownCallable(callable.to_string()));
        };
        let rule = rules
            .iter()
            .find(|rule| self.matches(rule, sig))
            .ok_or_else(|| InferenceError::NoMatchingRule(sig.clone()))?;
        trace!(method = %callable, instance = %sig, pattern = %rule.args, "rule matched");
        match &rule.result {
            RuleResult::Type(template) => fill_placeholders(template, sig),
            RuleResult::Fails(reason) => Err(InferenceError::Failed(reason.clone())),
        }
    }
}

/// Replace `$N` in a result template with the N-th argument type
pub fn fill_placeholders(template: &Type, sig: &Signature) -> Result<Type, InferenceError> {
    let mut result = template.clone();
    for var in template.free_vars() {
        let Some(index) = Type::Var(var.clone()).placeholder_index() else {
            continue;
        };
        let arg = index
            .checked_sub(1)
            .and_then(|i| sig.types().get(i))
            .ok_or_else(|| {
                InferenceError::Failed(format!(
                    "placeholder `{}` out of range for {}",
                    var, sig
                ))
            })?;
        result = result.substitute(&var, arg);
    }
    Ok(result)
}

/// Bounds every call of the wrapped oracle by a deadline. Each call runs
/// on a helper thread; a call that misses the deadline is abandoned and
/// reported as [`InferenceError::TimedOut`].
pub struct TimeoutOracle<O: ?Sized> {
    inner: Arc<O>,
    timeout: Duration,
}

impl<O: InferenceOracle + ?Sized + 'static> TimeoutOracle<O> {
    pub fn new(inner: Arc<O>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<O: InferenceOracle + ?Sized + 'static> InferenceOracle for TimeoutOracle<O> {
    fn infer(&self, callable: &MethodId, sig: &Signature) -> Result<Type, InferenceError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let method = callable.clone();
        let instance = sig.clone();
        thread::spawn(move || {
            // The receiver is gone once the deadline passed
            let _ = tx.send(inner.infer(&method, &instance));
        });
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(method = %callable, instance = %sig, timeout = ?self.timeout, "inference timed out");
                Err(InferenceError::TimedOut(self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(InferenceError::Disconnected),
        }
    }
}
