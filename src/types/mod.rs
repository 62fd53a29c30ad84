//! Type expressions explored by the lattice search.
//!
//! Contains the `Type` enum, `TypeVar`, and `Signature`, plus substitution
//! and free-variable queries. Types are immutable values compared
//! structurally; the lattice oracle decides how they relate.

mod parse;

pub use parse::{parse_generic_signature, parse_signature, parse_type, TypeParseError};

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Prefix of result placeholders in inference rules (`$1`, `$2`, ...)
pub const PLACEHOLDER_PREFIX: char = '$';

/// A type in the host lattice
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// The unconstrained top type
    Any,
    /// Declared type, optionally applied to arguments (`Complex{Float64}`)
    Nominal { name: String, args: Vec<Type> },
    /// Union of alternatives; `Union{}` is the empty (bottom) union
    Union(Vec<Type>),
    /// Existential type: `body where var<:upper`
    Exists { var: TypeVar, body: Box<Type> },
    /// Type variable reference, or a `$N` result placeholder
    Var(String),
    /// Variadic parameter marker
    Vararg(Box<Type>),
    /// Generic heap-box placeholder
    Boxed,
}

/// A bounded type variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeVar {
    pub name: String,
    pub upper: Box<Type>,
}

impl TypeVar {
    pub fn new(name: impl Into<String>, upper: Type) -> Self {
        Self {
            name: name.into(),
            upper: Box::new(upper),
        }
    }

    /// A variable whose only bound is `Any`
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, Type::Any)
    }

    pub fn is_unbounded(&self) -> bool {
        self.upper.is_any()
    }
}

impl Type {
    /// A bare declared type
    pub fn named(name: impl Into<String>) -> Self {
        Type::Nominal {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A declared type applied to arguments
    pub fn applied(name: impl Into<String>, args: Vec<Type>) -> Self {
        Type::Nominal {
            name: name.into(),
            args,
        }
    }

    /// Build a union, flattening nested unions and dropping duplicates.
    /// A single surviving member is returned as-is.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            match member {
                Type::Union(inner) => {
                    for t in inner {
                        if !flat.contains(&t) {
                            flat.push(t);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Type::Union(flat)
        }
    }

    pub fn exists(var: TypeVar, body: Type) -> Self {
        Type::Exists {
            var,
            body: Box::new(body),
        }
    }

    pub fn vararg(elem: Type) -> Self {
        Type::Vararg(Box::new(elem))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    pub fn is_vararg(&self) -> bool {
        matches!(self, Type::Vararg(_))
    }

    pub fn is_existential(&self) -> bool {
        matches!(self, Type::Exists { .. })
    }

    /// Split an existential into its outermost variable and body
    pub fn as_existential(&self) -> Option<(&TypeVar, &Type)> {
        match self {
            Type::Exists { var, body } => Some((var, body)),
            _ => None,
        }
    }

    /// Existential whose outermost variable is bounded only by `Any`
    pub fn is_unbounded_existential(&self) -> bool {
        self.as_existential()
            .is_some_and(|(var, _)| var.is_unbounded())
    }

    /// Name of the declared type at the core of this type, looking through
    /// existential wrappers.
    pub fn head(&self) -> Option<&str> {
        match self {
            Type::Nominal { name, .. } => Some(name),
            Type::Exists { body, .. } => body.head(),
            _ => None,
        }
    }

    /// Peel every existential layer, returning the bound variables
    /// (outermost first) and the core body.
    pub fn peel_existentials(&self) -> (Vec<&TypeVar>, &Type) {
        let mut vars = Vec::new();
        let mut core = self;
        while let Type::Exists { var, body } = core {
            vars.push(var);
            core = body;
        }
        (vars, core)
    }

    /// Replace free occurrences of variable `name` with `replacement`.
    /// An inner `where` rebinding the same name shadows it.
    pub fn substitute(&self, name: &str, replacement: &Type) -> Type {
        match self {
            Type::Var(v) if v == name => replacement.clone(),
            Type::Var(_) | Type::Any | Type::Boxed => self.clone(),
            Type::Nominal { name: n, args } => Type::Nominal {
                name: n.clone(),
                args: args
                    .iter()
                    .map(|a| a.substitute(name, replacement))
                    .collect(),
            },
            Type::Union(members) => {
                Type::union(members.iter().map(|m| m.substitute(name, replacement)))
            }
            Type::Exists { var, body } => {
                let upper = var.upper.substitute(name, replacement);
                let body = if var.name == name {
                    (**body).clone()
                } else {
                    body.substitute(name, replacement)
                };
                Type::exists(TypeVar::new(var.name.clone(), upper), body)
            }
            Type::Vararg(elem) => Type::vararg(elem.substitute(name, replacement)),
        }
    }

    /// Variables referenced but not bound by an enclosing `where`
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free_vars<'a>(&'a self, bound: &mut Vec<&'a str>, out: &mut BTreeSet<String>) {
        match self {
            Type::Var(v) => {
                if !bound.contains(&v.as_str()) {
                    out.insert(v.clone());
                }
            }
            Type::Any | Type::Boxed => {}
            Type::Nominal { args, .. } => {
                for a in args {
                    a.collect_free_vars(bound, out);
                }
            }
            Type::Union(members) => {
                for m in members {
                    m.collect_free_vars(bound, out);
                }
            }
            Type::Exists { var, body } => {
                var.upper.collect_free_vars(bound, out);
                bound.push(&var.name);
                body.collect_free_vars(bound, out);
                bound.pop();
            }
            Type::Vararg(elem) => elem.collect_free_vars(bound, out),
        }
    }

    /// No free type variables
    pub fn is_closed(&self) -> bool {
        self.free_vars().is_empty()
    }

    /// Index of a `$N` placeholder variable, 1-based
    pub fn placeholder_index(&self) -> Option<usize> {
        match self {
            Type::Var(v) => v.strip_prefix(PLACEHOLDER_PREFIX)?.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::Boxed => write!(f, "Box"),
            Type::Var(v) => write!(f, "{}", v),
            Type::Nominal { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "{{{}}}", join(args))?;
                }
                Ok(())
            }
            Type::Union(members) => write!(f, "Union{{{}}}", join(members)),
            Type::Vararg(elem) => write!(f, "Vararg{{{}}}", elem),
            Type::Exists { var, body } => {
                write!(f, "{} where {}", body, var.name)?;
                if !var.is_unbounded() {
                    if var.upper.is_existential() {
                        write!(f, "<:({})", var.upper)?;
                    } else {
                        write!(f, "<:{}", var.upper)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn join(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered parameter types of one method overload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature(Vec<Type>);

impl Signature {
    pub fn new(types: Vec<Type>) -> Self {
        Self(types)
    }

    pub fn types(&self) -> &[Type] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Type> {
        self.0.iter()
    }

    /// Copy of this signature with position `index` replaced
    pub fn with_position(&self, index: usize, ty: Type) -> Self {
        let mut types = self.0.clone();
        types[index] = ty;
        Self(types)
    }

    /// Free variables across all positions
    pub fn free_vars(&self) -> BTreeSet<String> {
        self.0.iter().flat_map(|t| t.free_vars()).collect()
    }

    pub fn into_types(self) -> Vec<Type> {
        self.0
    }
}

impl From<Vec<Type>> for Signature {
    fn from(types: Vec<Type>) -> Self {
        Self(types)
    }
}

impl std::ops::Index<usize> for Signature {
    type Output = Type;

    fn index(&self, index: usize) -> &Type {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a Signature {
    type Item = &'a Type;
    type IntoIter = std::slice::Iter<'a, Type>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", join(&self.0))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests;
