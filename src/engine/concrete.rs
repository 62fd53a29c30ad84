//! Concreteness rule for single types and signatures.

use crate::lattice::TypeLattice;
use crate::types::{Signature, Type};

/// A type is concrete when the lattice calls it dispatchable and it is not
/// the heap-box placeholder. Expected unions (`Union{T, Nothing}` and
/// friends) are let through as well.
pub fn is_concrete(lattice: &dyn TypeLattice, ty: &Type) -> bool {
    match ty {
        Type::Boxed => false,
        Type::Union(members) => is_expected_union(lattice, members),
        _ => lattice.is_dispatchable(ty),
    }
}

/// Union of dispatchable alternatives where every alternative but at most
/// one is a sentinel (`Nothing`, `Missing`).
pub fn is_expected_union(lattice: &dyn TypeLattice, members: &[Type]) -> bool {
    if members.is_empty() {
        return false;
    }
    let mut payloads = 0;
    for member in members {
        if matches!(member, Type::Boxed) || !lattice.is_dispatchable(member) {
            return false;
        }
        if !lattice.is_sentinel(member) {
            payloads += 1;
        }
    }
    payloads <= 1 && payloads < members.len()
}

/// Every position of the signature is concrete
pub fn all_concrete(lattice: &dyn TypeLattice, sig: &Signature) -> bool {
    sig.iter().all(|t| is_concrete(lattice, t))
}
