//! Instantiation of existential (parametric) types.

use tracing::trace;

use super::enumerate::{Enumeration, LatticeItem, SkippedExistentials};
use super::{CancelToken, EndReason, SearchConfig};
use crate::lattice::TypeLattice;
use crate::types::{Signature, Type};

/// Result of instantiating one existential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specialization {
    Type(Type),
    Skipped(SkippedExistentials),
}

/// Instantiate the outermost variable of `ty` with every type found below
/// its upper bound.
///
/// The bound is enumerated recursively with parametric components skipped,
/// so the recursion never goes deeper than one level. Instantiations the
/// lattice refuses are dropped.
///
/// # Panics
///
/// Panics when `ty` is not existential or its variable is bounded only by
/// `Any`; callers divert those to skip markers first.
pub fn expand_existential(
    lattice: &dyn TypeLattice,
    ty: &Type,
    config: &SearchConfig,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Specialization>, EndReason> {
    let Some((var, _)) = ty.as_existential() else {
        panic!("existential expansion called on non-parametric type `{}`", ty);
    };
    assert!(
        !var.is_unbounded(),
        "existential expansion called on unbounded type `{}`",
        ty
    );

    let derived = config.for_existential();
    let seed = Signature::new(vec![(*var.upper).clone()]);
    let mut inner = Enumeration::new(lattice, seed, &derived);
    if let Some(token) = cancel {
        inner = inner.with_cancel(token.clone());
    }

    let mut out = Vec::new();
    for item in inner {
        match item {
            LatticeItem::Instance(sig) => {
                let arg = &sig[0];
                match lattice.instantiate(ty, arg) {
                    Ok(specialized) => out.push(Specialization::Type(specialized)),
                    Err(err) => trace!(existential = %ty, %arg, %err, "dropping instantiation"),
                }
            }
            LatticeItem::Skipped(marker) => out.push(Specialization::Skipped(marker)),
            LatticeItem::End(reason) if reason.is_abort() => return Err(reason),
            LatticeItem::End(_) => break,
        }
    }
    Ok(out)
}
