//! Compiles notebook cells into reactive dataflow graphs.
//!
//! A cell arrives as the annotated syntax tree of an external single-cell
//! parser ([`parser::ParsedCell`]). The [`parser`] visitors turn it into
//! [`descriptor::CellDescriptor`]s: value cells with an explicit dependency
//! list and generated function source, view/mutable cells expanded into their
//! primitive parts, and import declarations with view/mutable bindings spelled
//! out. A [`listener::Listener`] consumes the descriptors, either building a
//! serializable tree ([`listener::CodeTreeBuilder`]) or registering nodes into
//! a runtime module ([`compiler::GraphCompiler`]).

pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod function;
pub mod listener;
pub mod parser;
pub mod runtime;

pub use compiler::{CompileOptions, Compiled, GraphCompiler, compile};
pub use config::Config;
pub use descriptor::{CellDefinition, CellDescriptor, ImportDefinition, Specifier};
pub use error::{Error, Result};
pub use listener::{CodeTreeBuilder, Listener, Notebook, visit_notebook};
pub use parser::{ParsedCell, parse_cell, parse_cells};
