//! On-disk lattice declarations (`lattice.toml`)

use serde::{Deserialize, Serialize};

use super::{LatticeError, TypeDecl, DEFAULT_SENTINELS};
use crate::types::{parse_type, TypeVar};

/// Lattice declaration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeFile {
    /// Types allowed next to one payload type in an expected union
    #[serde(default = "default_sentinels")]
    pub sentinels: Vec<String>,

    /// Declared types
    #[serde(default)]
    pub types: Vec<TypeDeclSpec>,
}

impl Default for LatticeFile {
    fn default() -> Self {
        Self {
            sentinels: default_sentinels(),
            types: Vec::new(),
        }
    }
}

fn default_sentinels() -> Vec<String> {
    DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect()
}

/// One declared type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDeclSpec {
    /// Type name
    pub name: String,

    /// Abstract types can have subtypes but are never dispatchable
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Declared supertype (defaults to `Any`)
    #[serde(default)]
    pub supertype: Option<String>,

    /// Type parameters, in order
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

/// A type parameter and its upper bound
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    /// Upper bound as a type expression (defaults to `Any`)
    #[serde(default)]
    pub upper: Option<String>,
}

impl TypeDeclSpec {
    pub(super) fn into_decl(self) -> Result<TypeDecl, LatticeError> {
        let mut decl = TypeDecl::new(self.name, self.is_abstract, self.supertype.as_deref());
        for param in self.params {
            let upper = match param.upper.as_deref() {
                Some(text) => parse_type(text)?,
                None => crate::types::Type::Any,
            };
            decl = decl.with_param(TypeVar::new(param.name, upper));
        }
        Ok(decl)
    }
}
