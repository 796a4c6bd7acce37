//! Descriptors emitted by the cell visitors and consumed by listeners.
//!
//! The serialized form is the notebook interchange format:
//!
//! ```json
//! { "type": "cell", "name": "x", "references": ["y"], "code": "function x(y) {…}" }
//! { "type": "import", "source": "@owner/notebook", "specifiers": [], "injections": [] }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal first arguments of the recognized resource calls, keyed by call
/// form and then by the literal itself (so repeated literals collapse).
pub type Constants = IndexMap<String, IndexMap<String, serde_json::Value>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CellDescriptor {
    Cell(CellDefinition),
    Import(ImportDefinition),
}

impl From<CellDefinition> for CellDescriptor {
    fn from(cell: CellDefinition) -> Self {
        Self::Cell(cell)
    }
}

impl From<ImportDefinition> for CellDescriptor {
    fn from(import: ImportDefinition) -> Self {
        Self::Import(import)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constants: Option<Constants>,
}

impl CellDefinition {
    pub fn new(name: Option<String>, references: Vec<String>, code: impl Into<String>) -> Self {
        Self {
            name,
            references,
            code: code.into(),
            constants: None,
        }
    }

    pub fn with_constants(mut self, constants: Option<Constants>) -> Self {
        self.constants = constants;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDefinition {
    pub source: String,
    #[serde(default)]
    pub specifiers: Vec<Specifier>,
    #[serde(default)]
    pub injections: Vec<Specifier>,
}

/// A `(name, alias)` binding pair.
///
/// For specifiers `name` lives in the imported module and `alias` in the
/// importing one; injections are the other way around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Specifier {
    pub name: String,
    pub alias: String,
}

impl Specifier {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.alias {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} as {}", self.name, self.alias)
        }
    }
}
