//! Worklist enumeration of the subtype lattice below a signature.

use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

use super::concrete::all_concrete;
use super::existential::{expand_existential, Specialization};
use super::{CancelToken, SearchConfig};
use crate::lattice::TypeLattice;
use crate::types::{Signature, Type};

/// Types whose subtype set is unbounded or unusable; never expanded
pub const UNENUMERABLE_TYPES: &[&str] = &["Function", "Type"];

/// Parametric types that were seen but deliberately not expanded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SkippedExistentials(pub Vec<Type>);

/// Why an enumeration stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The worklist ran dry
    Exhausted,
    /// `max_lattice_steps` was reached
    StepLimit,
    /// The cancel token fired
    Cancelled,
}

impl EndReason {
    /// Did the search stop before covering the lattice?
    pub fn is_abort(self) -> bool {
        !matches!(self, EndReason::Exhausted)
    }
}

/// One element of the enumeration stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatticeItem {
    Instance(Signature),
    Skipped(SkippedExistentials),
    End(EndReason),
}

/// One result of a direct-subtype expansion; also the worklist element type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Signature(Signature),
    Skipped(SkippedExistentials),
}

/// Lazy, single-use stream of lattice items. The last item is always
/// `LatticeItem::End`; after it the iterator returns `None`.
pub struct Enumeration<'a> {
    lattice: &'a dyn TypeLattice,
    config: SearchConfig,
    cancel: Option<CancelToken>,
    worklist: VecDeque<Expansion>,
    seen: HashSet<Signature>,
    ready: VecDeque<LatticeItem>,
    steps: usize,
    yields: usize,
    finished: bool,
}

/// Start enumerating the lattice below `sig`
pub fn enumerate<'a>(
    lattice: &'a dyn TypeLattice,
    sig: Signature,
    config: &SearchConfig,
) -> Enumeration<'a> {
    Enumeration::new(lattice, sig, config)
}

impl<'a> Enumeration<'a> {
    pub fn new(lattice: &'a dyn TypeLattice, sig: Signature, config: &SearchConfig) -> Self {
        debug!(signature = %sig, "starting lattice enumeration");
        let mut seen = HashSet::new();
        seen.insert(sig.clone());
        Self {
            lattice,
            config: config.clone(),
            cancel: None,
            worklist: VecDeque::from([Expansion::Signature(sig)]),
            seen,
            ready: VecDeque::new(),
            steps: 0,
            yields: 0,
            finished: false,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Worklist pops so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Concrete instantiations emitted so far
    pub fn yields(&self) -> usize {
        self.yields
    }

    fn finish(&mut self, reason: EndReason) {
        debug!(
            ?reason,
            steps = self.steps,
            yields = self.yields,
            "lattice enumeration finished"
        );
        self.ready.push_back(LatticeItem::End(reason));
        self.finished = true;
    }

    fn visit(&mut self, sig: Signature) {
        if all_concrete(self.lattice, &sig) {
            self.yields += 1;
            self.ready.push_back(LatticeItem::Instance(sig));
            return;
        }

        let existentials: Vec<Type> = sig.iter().filter(|t| t.is_existential()).cloned().collect();
        if !existentials.is_empty() {
            if self.config.skip_unbound_existentials {
                self.ready
                    .push_back(LatticeItem::Skipped(SkippedExistentials(existentials)));
                return;
            }
            let unbounded: Vec<Type> = existentials
                .into_iter()
                .filter(Type::is_unbounded_existential)
                .collect();
            if !unbounded.is_empty() {
                self.ready
                    .push_back(LatticeItem::Skipped(SkippedExistentials(unbounded)));
                return;
            }
        }

        if !self.config.concrete_only {
            self.ready.push_back(LatticeItem::Instance(sig.clone()));
        }

        match direct_subtypes(self.lattice, &sig, &self.config, self.cancel.as_ref()) {
            Ok(expansions) => {
                for expansion in expansions {
                    match expansion {
                        Expansion::Signature(child) => {
                            if self.seen.insert(child.clone()) {
                                self.worklist.push_back(Expansion::Signature(child));
                            }
                        }
                        marker @ Expansion::Skipped(_) => self.worklist.push_back(marker),
                    }
                }
            }
            Err(reason) => self.finish(reason),
        }
    }
}

impl Iterator for Enumeration<'_> {
    type Item = LatticeItem;

    fn next(&mut self) -> Option<LatticeItem> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                self.finish(EndReason::Cancelled);
                continue;
            }
            if self.worklist.is_empty() {
                self.finish(EndReason::Exhausted);
                continue;
            }
            if self.steps >= self.config.max_lattice_steps {
                self.finish(EndReason::StepLimit);
                continue;
            }
            let Some(work) = self.worklist.pop_front() else {
                continue;
            };
            self.steps += 1;
            match work {
                Expansion::Skipped(marker) => self.ready.push_back(LatticeItem::Skipped(marker)),
                Expansion::Signature(sig) => {
                    trace!(step = self.steps, signature = %sig, "visiting");
                    self.visit(sig);
                }
            }
        }
    }
}

/// Expand `sig` one step down the lattice, one position at a time.
///
/// Every position is replaced by each of its immediate subtypes while the
/// other positions stay fixed. A skip marker found for a position takes the
/// place of the tuple it would have produced. An abort inside a recursive
/// existential expansion is returned as `Err`.
pub fn direct_subtypes(
    lattice: &dyn TypeLattice,
    sig: &Signature,
    config: &SearchConfig,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Expansion>, EndReason> {
    let mut out = Vec::new();
    for (index, ty) in sig.iter().enumerate() {
        for specialization in position_subtypes(lattice, ty, config, cancel)? {
            match specialization {
                Specialization::Type(sub) => {
                    out.push(Expansion::Signature(sig.with_position(index, sub)))
                }
                Specialization::Skipped(marker) => out.push(Expansion::Skipped(marker)),
            }
        }
    }
    Ok(out)
}

fn position_subtypes(
    lattice: &dyn TypeLattice,
    ty: &Type,
    config: &SearchConfig,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Specialization>, EndReason> {
    if ty.is_vararg() || is_unenumerable(ty) {
        return Ok(Vec::new());
    }
    if let Type::Union(members) = ty {
        return Ok(members.iter().cloned().map(Specialization::Type).collect());
    }
    let declared = lattice.declared_subtypes(ty);
    if declared.is_empty() && ty.is_existential() {
        return expand_existential(lattice, ty, config, cancel);
    }
    Ok(declared.into_iter().map(Specialization::Type).collect())
}

fn is_unenumerable(ty: &Type) -> bool {
    match ty {
        Type::Any => true,
        Type::Nominal { name, args } => {
            args.is_empty() && UNENUMERABLE_TYPES.contains(&name.as_str())
        }
        _ => false,
    }
}
