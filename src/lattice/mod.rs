//! Type lattice oracle.
//!
//! The engine only sees the `TypeLattice` trait. `TypeRegistry` is the
//! registry-backed implementation, built from a TOML declaration file
//! (`lattice.toml`) since the subtype relation cannot be discovered by
//! reflection.

mod file;

pub use file::{LatticeFile, ParamSpec, TypeDeclSpec};

use miette::Diagnostic;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::types::{Type, TypeParseError, TypeVar};

/// Names that are always declared
pub const BUILTIN_ABSTRACT: &[&str] = &["Function", "Type"];
/// Default members of the expected-union sentinel set
pub const DEFAULT_SENTINELS: &[&str] = &["Nothing", "Missing"];

/// Subtype relation and declared structure of the host type system
pub trait TypeLattice: Send + Sync {
    /// Immediate declared subtypes of `ty`. Parametric children come back
    /// closed over their parameters as existentials.
    fn declared_subtypes(&self, ty: &Type) -> Vec<Type>;

    /// Is `sub` a subtype of `sup`?
    fn is_subtype(&self, sub: &Type, sup: &Type) -> bool;

    /// Is `ty` a fully resolved, instantiable (dispatchable) type?
    fn is_dispatchable(&self, ty: &Type) -> bool;

    /// Is `ty` a member of the expected-union sentinel set?
    fn is_sentinel(&self, ty: &Type) -> bool;

    /// Instantiate the outermost variable of `existential` with `arg`
    fn instantiate(&self, existential: &Type, arg: &Type) -> Result<Type, InstantiateError>;
}

/// Why a parametric type could not be instantiated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiateError {
    #[error("`{0}` is not an existential type")]
    NotExistential(Type),
    #[error("`{arg}` does not satisfy `{var}<:{upper}`")]
    BoundViolation { arg: Type, var: String, upper: Type },
    #[error("`{arg}` violates the declared bound `{param}<:{upper}` of `{name}`")]
    DeclaredBoundViolation {
        name: String,
        param: String,
        arg: Type,
        upper: Type,
    },
    #[error("`{name}` expects {expected} type argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("a variadic marker cannot be a type argument: `{0}`")]
    Variadic(Type),
}

/// Errors raised while building a registry
#[derive(Debug, Error, Diagnostic)]
pub enum LatticeError {
    #[error("failed to read lattice file {path}: {message}")]
    #[diagnostic(code(stabcheck::lattice::io))]
    Io { path: String, message: String },

    #[error("failed to parse lattice file: {0}")]
    #[diagnostic(code(stabcheck::lattice::parse))]
    Parse(String),

    #[error("type `{0}` is declared more than once")]
    #[diagnostic(code(stabcheck::lattice::duplicate))]
    Duplicate(String),

    #[error("type `{name}` names unknown supertype `{supertype}`")]
    #[diagnostic(code(stabcheck::lattice::unknown_supertype))]
    UnknownSupertype { name: String, supertype: String },

    #[error("type `{name}` cannot subtype concrete type `{supertype}`")]
    #[diagnostic(
        code(stabcheck::lattice::concrete_supertype),
        help("only abstract types may have declared subtypes")
    )]
    ConcreteSupertype { name: String, supertype: String },

    #[error("supertype chain of {0:?} is cyclic")]
    #[diagnostic(code(stabcheck::lattice::cycle))]
    Cycle(Vec<String>),

    #[error("bound of parameter `{param}` of `{name}` must be closed, found `{upper}`")]
    #[diagnostic(code(stabcheck::lattice::open_bound))]
    OpenBound {
        name: String,
        param: String,
        upper: Type,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypeParseError),
}

/// A declared type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub is_abstract: bool,
    pub supertype: Option<String>,
    pub params: Vec<TypeVar>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, is_abstract: bool, supertype: Option<&str>) -> Self {
        Self {
            name: name.into(),
            is_abstract,
            supertype: supertype.map(str::to_string),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, var: TypeVar) -> Self {
        self.params.push(var);
        self
    }

    /// The declared type closed over its parameters, outermost parameter first:
    /// `Pair{A, B} where B<:.. where A<:..`
    pub fn closed_type(&self) -> Type {
        if self.params.is_empty() {
            return Type::named(self.name.clone());
        }
        let args = self
            .params
            .iter()
            .map(|p| Type::Var(p.name.clone()))
            .collect();
        let mut ty = Type::applied(self.name.clone(), args);
        for param in self.params.iter().rev() {
            ty = Type::exists(param.clone(), ty);
        }
        ty
    }
}

/// Registry-backed type lattice
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    decls: HashMap<String, TypeDecl>,
    /// Declared children per type, in declaration order
    children: HashMap<String, Vec<String>>,
    sentinels: HashSet<String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry holding only the built-in declarations
    pub fn new() -> Self {
        let mut registry = Self {
            decls: HashMap::new(),
            children: HashMap::new(),
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
        };
        registry.insert(TypeDecl::new("Any", true, None));
        for name in BUILTIN_ABSTRACT {
            registry.insert(TypeDecl::new(*name, true, Some("Any")));
        }
        for name in DEFAULT_SENTINELS {
            registry.insert(TypeDecl::new(*name, false, Some("Any")));
        }
        registry
    }

    /// Load a registry from a lattice file on disk
    pub fn load(path: &Path) -> Result<Self, LatticeError> {
        let content = std::fs::read_to_string(path).map_err(|e| LatticeError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse a registry from TOML text
    pub fn parse(content: &str) -> Result<Self, LatticeError> {
        let file: LatticeFile =
            toml::from_str(content).map_err(|e| LatticeError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    /// Build a registry from a parsed lattice file. Declarations may appear
    /// in any order; supertypes are resolved before their children.
    pub fn from_file(file: LatticeFile) -> Result<Self, LatticeError> {
        let mut registry = Self::new();
        registry.sentinels = file.sentinels.iter().cloned().collect();

        let mut pending = Vec::new();
        let mut names = HashSet::new();
        for spec in file.types {
            if !names.insert(spec.name.clone()) {
                return Err(LatticeError::Duplicate(spec.name));
            }
            pending.push(spec.into_decl()?);
        }

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for decl in pending {
                let ready = decl
                    .supertype
                    .as_ref()
                    .map_or(true, |s| registry.decls.contains_key(s));
                if ready {
                    registry.declare(decl)?;
                } else {
                    deferred.push(decl);
                }
            }
            if deferred.len() == before {
                let orphan = deferred.iter().find_map(|d| {
                    d.supertype
                        .as_ref()
                        .filter(|s| !names.contains(*s))
                        .map(|s| (d.name.clone(), s.clone()))
                });
                return Err(match orphan {
                    Some((name, supertype)) => LatticeError::UnknownSupertype { name, supertype },
                    None => LatticeError::Cycle(deferred.iter().map(|d| d.name.clone()).collect()),
                });
            }
            pending = deferred;
        }
        Ok(registry)
    }

    /// Add one declaration; its supertype must already be declared
    pub fn declare(&mut self, decl: TypeDecl) -> Result<(), LatticeError> {
        if self.decls.contains_key(&decl.name) {
            return Err(LatticeError::Duplicate(decl.name));
        }
        let supertype = decl.supertype.clone().unwrap_or_else(|| "Any".to_string());
        match self.decls.get(&supertype) {
            None => {
                return Err(LatticeError::UnknownSupertype {
                    name: decl.name,
                    supertype,
                })
            }
            Some(parent) if !parent.is_abstract => {
                return Err(LatticeError::ConcreteSupertype {
                    name: decl.name,
                    supertype,
                })
            }
            Some(_) => {}
        }
        for param in &decl.params {
            if !param.upper.is_closed() {
                return Err(LatticeError::OpenBound {
                    name: decl.name.clone(),
                    param: param.name.clone(),
                    upper: (*param.upper).clone(),
                });
            }
        }
        self.insert(TypeDecl {
            supertype: Some(supertype),
            ..decl
        });
        Ok(())
    }

    fn insert(&mut self, decl: TypeDecl) {
        if let Some(parent) = &decl.supertype {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(decl.name.clone());
        }
        self.decls.insert(decl.name.clone(), decl);
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.get(name)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Immediate declared supertype of a nominal type. Arguments carry over
    /// when the supertype has the same parameter arity.
    fn supertype_of(&self, name: &str, args: &[Type]) -> Option<Type> {
        let parent = self.decls.get(self.decls.get(name)?.supertype.as_ref()?)?;
        if parent.params.is_empty() {
            Some(Type::named(parent.name.clone()))
        } else if parent.params.len() == args.len() {
            Some(Type::applied(parent.name.clone(), args.to_vec()))
        } else {
            Some(parent.closed_type())
        }
    }

    fn nominal_subtype(&self, name: &str, args: &[Type], sup: &Type) -> bool {
        if let Type::Nominal {
            name: sup_name,
            args: sup_args,
        } = sup
        {
            if name == sup_name {
                return args == sup_args.as_slice();
            }
        }
        match self.supertype_of(name, args) {
            Some(parent) => self.is_subtype(&parent, sup),
            None => false,
        }
    }

    /// Does `sub` (a nominal type) instantiate the existential `sup`?
    fn matches_existential(&self, sub: &Type, sup: &Type) -> bool {
        let Type::Nominal { name, args } = sub else {
            return false;
        };
        let (vars, core) = sup.peel_existentials();
        if let Type::Nominal {
            name: core_name,
            args: core_args,
        } = core
        {
            if name == core_name && args.len() == core_args.len() {
                let mut bindings: HashMap<&str, &Type> = HashMap::new();
                let mut ok = true;
                for (actual, pattern) in args.iter().zip(core_args) {
                    let var = match pattern {
                        Type::Var(v) => vars.iter().find(|tv| tv.name == *v),
                        _ => None,
                    };
                    match var {
                        Some(tv) => {
                            if actual.is_vararg() || !self.is_subtype(actual, &tv.upper) {
                                ok = false;
                            } else if let Some(prev) = bindings.insert(tv.name.as_str(), actual) {
                                ok &= prev == actual;
                            }
                        }
                        None => ok &= actual == pattern,
                    }
                    if !ok {
                        break;
                    }
                }
                if ok {
                    return true;
                }
            }
        }
        match self.supertype_of(name, args) {
            Some(parent) => self.is_subtype(&parent, sup),
            None => false,
        }
    }

    /// Check the declared parameter bounds of the nominal core of `ty`
    fn check_declared_bounds(&self, ty: &Type) -> Result<(), InstantiateError> {
        let (_, core) = ty.peel_existentials();
        let Type::Nominal { name, args } = core else {
            return Ok(());
        };
        let Some(decl) = self.decls.get(name) else {
            return Ok(());
        };
        if decl.params.len() != args.len() {
            return Err(InstantiateError::Arity {
                name: name.clone(),
                expected: decl.params.len(),
                found: args.len(),
            });
        }
        for (param, arg) in decl.params.iter().zip(args) {
            if arg.is_closed() && !self.is_subtype(arg, &param.upper) {
                return Err(InstantiateError::DeclaredBoundViolation {
                    name: name.clone(),
                    param: param.name.clone(),
                    arg: arg.clone(),
                    upper: (*param.upper).clone(),
                });
            }
        }
        Ok(())
    }
}

impl TypeLattice for TypeRegistry {
    fn declared_subtypes(&self, ty: &Type) -> Vec<Type> {
        match ty {
            Type::Any => self.children_of("Any", &[]),
            Type::Nominal { name, args } => self.children_of(name, args),
            _ => Vec::new(),
        }
    }

    fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        if sub == sup || sup.is_any() {
            return true;
        }
        match (sub, sup) {
            (Type::Union(members), _) => members.iter().all(|m| self.is_subtype(m, sup)),
            (_, Type::Union(members)) => members.iter().any(|m| self.is_subtype(sub, m)),
            (Type::Nominal { .. }, Type::Exists { .. }) => self.matches_existential(sub, sup),
            (Type::Exists { var, body }, _) => {
                self.is_subtype(&body.substitute(&var.name, &var.upper), sup)
            }
            (Type::Nominal { name, args }, _) => self.nominal_subtype(name, args, sup),
            _ => false,
        }
    }

    fn is_dispatchable(&self, ty: &Type) -> bool {
        match ty {
            Type::Nominal { name, args } => self.decls.get(name).is_some_and(|decl| {
                !decl.is_abstract
                    && decl.params.len() == args.len()
                    && args.iter().all(|a| a.is_closed() && !a.is_vararg())
            }),
            _ => false,
        }
    }

    fn is_sentinel(&self, ty: &Type) -> bool {
        matches!(ty, Type::Nominal { name, args } if args.is_empty() && self.sentinels.contains(name))
    }

    fn instantiate(&self, existential: &Type, arg: &Type) -> Result<Type, InstantiateError> {
        let Some((var, body)) = existential.as_existential() else {
            return Err(InstantiateError::NotExistential(existential.clone()));
        };
        if arg.is_vararg() {
            return Err(InstantiateError::Variadic(arg.clone()));
        }
        if !self.is_subtype(arg, &var.upper) {
            return Err(InstantiateError::BoundViolation {
                arg: arg.clone(),
                var: var.name.clone(),
                upper: (*var.upper).clone(),
            });
        }
        let result = body.substitute(&var.name, arg);
        self.check_declared_bounds(&result)?;
        Ok(result)
    }
}

impl TypeRegistry {
    fn children_of(&self, name: &str, args: &[Type]) -> Vec<Type> {
        let Some(children) = self.children.get(name) else {
            return Vec::new();
        };
        children
            .iter()
            .filter_map(|child| self.decls.get(child))
            .filter_map(|decl| {
                if args.is_empty() {
                    Some(decl.closed_type())
                } else if decl.params.len() == args.len() {
                    let applied = Type::applied(decl.name.clone(), args.to_vec());
                    self.check_declared_bounds(&applied).ok().map(|()| applied)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
