//! Module files: callables of one scope, their declared signatures, and
//! the inference rules that stand in for the host's inference.
//!
//! ```toml
//! scope = "Demo"
//! file = "demo.jl"
//!
//! [[functions]]
//! name = "inc"
//! exported = true
//! line = 3
//! signatures = [["Integer"]]
//! rules = [{ args = ["Integer"], result = "$1" }]
//! ```

mod batch;

pub use batch::{BatchChecker, PendingChecks};

use miette::Diagnostic;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::{MethodId, SearchConfig};
use crate::inference::{InferenceRule, RuleTable};
use crate::types::{
    parse_generic_signature, parse_signature, parse_type, Signature, TypeParseError,
};

/// Extension of module files
pub const MODULE_EXTENSION: &str = "toml";

/// On-disk module description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleFile {
    /// Scope (module) name
    pub scope: String,

    /// Default source file of the scope's callables
    #[serde(default)]
    pub file: Option<String>,

    /// Callables defined in the scope
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

/// One callable and its overloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,

    /// Publicly exported from the scope
    #[serde(default)]
    pub exported: bool,

    /// Source line of the first overload
    #[serde(default)]
    pub line: u32,

    /// Overrides the scope's source file
    #[serde(default)]
    pub file: Option<String>,

    /// One parameter list per overload
    #[serde(default)]
    pub signatures: Vec<Vec<String>>,

    /// Method-level type parameters (`where T`)
    #[serde(default, rename = "where")]
    pub type_params: Vec<String>,

    /// Inference rules, tried in order
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// `args -> result` rule as written in the module file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub args: Vec<String>,

    #[serde(default)]
    pub result: Option<String>,

    /// Inference fails for matching instantiations
    #[serde(default)]
    pub fails: bool,

    /// Failure reason reported when `fails` is set
    #[serde(default)]
    pub reason: Option<String>,
}

/// Errors raised while loading a module file
#[derive(Debug, Error, Diagnostic)]
pub enum ModuleError {
    #[error("failed to read module file {path}: {message}")]
    #[diagnostic(code(stabcheck::module::io))]
    Io { path: String, message: String },

    #[error("failed to parse module file {path}: {message}")]
    #[diagnostic(code(stabcheck::module::parse))]
    Parse { path: String, message: String },

    #[error("invalid type in `{callable}`")]
    #[diagnostic(code(stabcheck::module::type_syntax))]
    Type {
        callable: String,
        #[source]
        source: TypeParseError,
    },

    #[error("callable `{name}` is declared more than once in scope `{scope}`")]
    #[diagnostic(code(stabcheck::module::duplicate))]
    DuplicateCallable { scope: String, name: String },

    #[error("bad inference rule for `{callable}`: {message}")]
    #[diagnostic(
        code(stabcheck::module::bad_rule),
        help("a rule needs either `result` or `fails = true`, and `$N` must name an argument")
    )]
    BadRule { callable: String, message: String },
}

/// One overload found in a module
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedMethod {
    pub id: MethodId,
    pub exported: bool,
}

/// A module resolved into method identities and inference rules
#[derive(Debug, Clone)]
pub struct ScannedModule {
    pub scope: String,
    pub methods: Vec<ScannedMethod>,
    /// Overloads with free type variables; listed, never analyzed
    pub generic: Vec<ScannedMethod>,
    rules: Vec<(String, InferenceRule)>,
}

impl ModuleFile {
    /// Load a module file from disk
    pub fn load(path: &Path) -> Result<Self, ModuleError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModuleError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse_named(&content, &path.display().to_string())
    }

    /// Parse a module from TOML text
    pub fn parse(content: &str) -> Result<Self, ModuleError> {
        Self::parse_named(content, "<input>")
    }

    fn parse_named(content: &str, path: &str) -> Result<Self, ModuleError> {
        toml::from_str(content).map_err(|e| ModuleError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolve every declared overload and rule
    pub fn resolve(&self) -> Result<ScannedModule, ModuleError> {
        let mut seen = HashSet::new();
        let mut methods = Vec::new();
        let mut generic = Vec::new();
        let mut rules = Vec::new();

        for function in &self.functions {
            if !seen.insert(function.name.as_str()) {
                return Err(ModuleError::DuplicateCallable {
                    scope: self.scope.clone(),
                    name: function.name.clone(),
                });
            }
            let callable = format!("{}.{}", self.scope, function.name);
            let file = function
                .file
                .clone()
                .or_else(|| self.file.clone())
                .unwrap_or_default();

            for (offset, params) in function.signatures.iter().enumerate() {
                let signature =
                    parse_generic_signature(params.as_slice(), function.type_params.as_slice())
                        .map_err(|source| ModuleError::Type {
                            callable: callable.clone(),
                            source,
                        })?;
                let line = if function.line == 0 {
                    0
                } else {
                    function.line + offset as u32
                };
                let id = MethodId::new(function.name.clone(), self.scope.clone(), signature)
                    .at(file.clone(), line);
                let free = id.signature.free_vars();
                if free.is_empty() {
                    methods.push(ScannedMethod {
                        id,
                        exported: function.exported,
                    });
                } else {
                    warn!(method = %id, ?free, "skipping generic signature");
                    generic.push(ScannedMethod {
                        id,
                        exported: function.exported,
                    });
                }
            }

            for spec in &function.rules {
                rules.push((function.name.clone(), resolve_rule(&callable, spec)?));
            }
        }

        debug!(
            scope = %self.scope,
            methods = methods.len(),
            generic = generic.len(),
            rules = rules.len(),
            "module resolved"
        );
        Ok(ScannedModule {
            scope: self.scope.clone(),
            methods,
            generic,
            rules,
        })
    }
}

fn resolve_rule(callable: &str, spec: &RuleSpec) -> Result<InferenceRule, ModuleError> {
    let bad = |message: String| ModuleError::BadRule {
        callable: callable.to_string(),
        message,
    };
    let args: Signature =
        parse_signature(spec.args.as_slice()).map_err(|source| ModuleError::Type {
            callable: callable.to_string(),
            source,
        })?;
    let rule = match (&spec.result, spec.fails) {
        (Some(_), true) => return Err(bad("`result` and `fails` are exclusive".to_string())),
        (None, false) => return Err(bad("missing `result`".to_string())),
        (None, true) => InferenceRule::fails(
            args,
            spec.reason
                .clone()
                .unwrap_or_else(|| "marked as failing".to_string()),
        ),
        (Some(result), false) => {
            let result = parse_type(result).map_err(|source| ModuleError::Type {
                callable: callable.to_string(),
                source,
            })?;
            InferenceRule::returns(args, result)
        }
    };
    if rule.max_placeholder() > rule.args.len() {
        return Err(bad(format!(
            "placeholder `${}` exceeds the {} rule argument(s)",
            rule.max_placeholder(),
            rule.args.len()
        )));
    }
    Ok(rule)
}

impl ScannedModule {
    /// Add this module's rules to an inference table
    pub fn install_rules(&self, table: &mut RuleTable) {
        for (name, rule) in &self.rules {
            table.add_rule(&self.scope, name, rule.clone());
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Collect the checks for one scope. Order follows declaration order.
pub fn scan(module: &ScannedModule, config: &SearchConfig, filter: Option<&Regex>) -> PendingChecks {
    let mut pending = PendingChecks::new();
    for method in module.methods.iter().filter(|m| selected(m, config, filter)) {
        pending.register(method.id.clone(), method.id.signature.clone());
    }
    debug!(scope = %module.scope, checks = pending.len(), "module scanned");
    pending
}

/// Generic overloads a scan with the same settings would have checked
pub fn set_aside(
    module: &ScannedModule,
    config: &SearchConfig,
    filter: Option<&Regex>,
) -> Vec<MethodId> {
    module
        .generic
        .iter()
        .filter(|m| selected(m, config, filter))
        .map(|m| m.id.clone())
        .collect()
}

fn selected(method: &ScannedMethod, config: &SearchConfig, filter: Option<&Regex>) -> bool {
    if config.exported_only && !method.exported {
        return false;
    }
    filter.map_or(true, |re| re.is_match(&method.id.name))
}

/// Module files under the given paths. Directories are searched
/// recursively; results are sorted for stable scan order.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ModuleError> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_module_files(path, &mut found)?;
        } else {
            found.push(path.clone());
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

fn collect_module_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ModuleError> {
    let io_err = |e: std::io::Error| ModuleError::Io {
        path: dir.display().to_string(),
        message: e.to_string(),
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_module_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == MODULE_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
