//! Batch classification of pending checks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info, warn};

use crate::engine::{
    CancelToken, MethodCheckResult, MethodId, Outcome, SearchConfig, StabilityChecker,
};
use crate::inference::InferenceOracle;
use crate::lattice::TypeLattice;
use crate::types::Signature;

/// Caller-owned list of `(callable, signature)` pairs awaiting a check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChecks {
    entries: Vec<(MethodId, Signature)>,
}

impl PendingChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callable: MethodId, sig: Signature) {
        self.entries.push((callable, sig));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(MethodId, Signature)> {
        self.entries.iter()
    }

    /// Take every entry, leaving the list empty
    pub fn drain(&mut self) -> std::vec::Drain<'_, (MethodId, Signature)> {
        self.entries.drain(..)
    }

    /// Append the entries of another list
    pub fn append(&mut self, other: &mut PendingChecks) {
        self.entries.append(&mut other.entries);
    }
}

impl Extend<(MethodId, Signature)> for PendingChecks {
    fn extend<I: IntoIterator<Item = (MethodId, Signature)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Runs pending checks, possibly on several worker threads
pub struct BatchChecker<'a> {
    lattice: &'a dyn TypeLattice,
    oracle: &'a dyn InferenceOracle,
    config: SearchConfig,
    jobs: usize,
    cancel: CancelToken,
}

impl<'a> BatchChecker<'a> {
    pub fn new(
        lattice: &'a dyn TypeLattice,
        oracle: &'a dyn InferenceOracle,
        config: SearchConfig,
    ) -> Self {
        Self {
            lattice,
            oracle,
            config,
            jobs: 1,
            cancel: CancelToken::new(),
        }
    }

    /// Number of concurrent classifications; 0 is treated as 1
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the batch when cancelled
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Classify every pending entry. Results come back in registration
    /// order. After cancellation no new classification starts; the ones
    /// already running finish as `FuelExhausted`.
    pub fn check(&self, mut pending: PendingChecks) -> Vec<MethodCheckResult> {
        let entries: Vec<(MethodId, Signature)> = pending.drain().collect();
        let total = entries.len();
        let workers = self.jobs.min(total).max(1);
        debug!(checks = total, workers, "starting batch");

        let cursor = AtomicUsize::new(0);
        let mut indexed: Vec<(usize, MethodCheckResult)> = if workers == 1 {
            self.worker(&entries, &cursor)
        } else {
            thread::scope(|scope| {
                let handles: Vec<_> = (0..workers)
                    .map(|_| scope.spawn(|| self.worker(&entries, &cursor)))
                    .collect();
                let mut all = Vec::with_capacity(total);
                for handle in handles {
                    match handle.join() {
                        Ok(results) => all.extend(results),
                        Err(_) => warn!("batch worker panicked"),
                    }
                }
                all
            })
        };
        indexed.sort_by_key(|(index, _)| *index);

        let results: Vec<MethodCheckResult> = indexed.into_iter().map(|(_, r)| r).collect();
        let stable = results.iter().filter(|r| r.outcome.is_stable()).count();
        info!(
            checked = results.len(),
            stable,
            skipped = total - results.len(),
            "batch finished"
        );
        results
    }

    /// Pull entries off the shared cursor until none remain
    fn worker(
        &self,
        entries: &[(MethodId, Signature)],
        cursor: &AtomicUsize,
    ) -> Vec<(usize, MethodCheckResult)> {
        let checker = StabilityChecker::new(self.lattice, self.oracle, self.config.clone())
            .with_cancel(self.cancel.clone());
        let mut out = Vec::new();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some((callable, sig)) = entries.get(index) else {
                break;
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| checker.classify(callable, sig)))
                .unwrap_or_else(|_| {
                    warn!(method = %callable, "classification panicked");
                    Outcome::InferenceFailure {
                        instantiation: sig.clone(),
                        reason: "classification panicked".to_string(),
                    }
                });
            debug!(method = %callable, outcome = %outcome.kind(), "classified");
            out.push((
                index,
                MethodCheckResult {
                    method: callable.clone(),
                    outcome,
                },
            ));
        }
        out
    }
}
