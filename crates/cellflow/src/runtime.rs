//! The dataflow runtime the compiler registers cells into.
//!
//! The compiler only needs a small capability surface: create modules and
//! variables, define or import a variable, derive a module with injected
//! bindings, and wrap a constant. [`memory`] provides an in-process
//! implementation of that surface.

use crate::descriptor::{CellDefinition, Specifier};
use thiserror::Error;

mod arena;
mod intrinsics;
pub mod memory;
mod value;

pub use intrinsics::{Definition, Evaluator, Intrinsics, Opaque};
pub use memory::{MemoryModule, MemoryRuntime, MemoryVariable, Observer, VariableInfo};
pub use value::{Intrinsic, MutableRef, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{0} is not defined")]
    NotDefined(String),
    #[error("circular definition involving {0}")]
    Circular(String),
    #[error("{0}")]
    Evaluation(String),
    #[error("variable has been deleted")]
    Deleted,
    #[error("graph did not settle after {0} passes")]
    Unsettled(usize),
}

pub trait Runtime: Clone {
    type Module: Module;

    /// Creates an empty module.
    fn module(&self) -> Self::Module;
}

pub trait Module: Clone {
    type Variable: Variable<Module = Self>;
    type Definition;
    type Observer;

    fn variable(&self, observer: Option<Self::Observer>) -> Self::Variable;

    /// Copy of this module where each injection's `alias` is bound to its
    /// `name` in `from`.
    fn derive(&self, injections: &[Specifier], from: &Self) -> Self;

    /// Definition that always yields `text`.
    fn constant(&self, text: String) -> Self::Definition;
}

pub trait Variable: Clone {
    type Module: Module;

    fn define(
        &self,
        name: Option<&str>,
        inputs: &[String],
        definition: <Self::Module as Module>::Definition,
    ) -> Result<(), RuntimeError>;

    /// Binds this variable as `alias`, reading `name` from `from`.
    fn import(&self, name: &str, alias: &str, from: &Self::Module) -> Result<(), RuntimeError>;

    fn delete(&self);
}

/// Turns cell code into something the module can run.
pub trait CellCompiler<M: Module> {
    fn compile(&self, cell: &CellDefinition, module: &M) -> crate::Result<M::Definition>;
}
