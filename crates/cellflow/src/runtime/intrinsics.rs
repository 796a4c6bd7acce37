//! Compiles cell code for the in-memory runtime.
//!
//! The generated helper cells (view value, mutable wrapper, mutable value)
//! run natively. User code goes through an [`Evaluator`], the seam where a
//! JavaScript engine plugs in.

use super::value::{Intrinsic, MutableRef, Value};
use super::{CellCompiler, MemoryModule, RuntimeError};
use crate::descriptor::CellDefinition;
use crate::error::{Error, Result};
use crate::function::FunctionSource;
use crate::parser::Synthetic;
use std::fmt;
use std::rc::Rc;

type Body = dyn Fn(&[Value]) -> Result<Value, RuntimeError>;

/// Body of a variable: maps input values to its value.
#[derive(Clone)]
pub struct Definition(Rc<Body>);

impl Definition {
    pub fn new(body: impl Fn(&[Value]) -> Result<Value, RuntimeError> + 'static) -> Self {
        Self(Rc::new(body))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(move |_| Ok(value.clone()))
    }

    pub fn call(&self, inputs: &[Value]) -> Result<Value, RuntimeError> {
        (self.0)(inputs)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Definition")
    }
}

/// Instantiates user cell code.
pub trait Evaluator {
    fn instantiate(&self, function: &FunctionSource, cell: &CellDefinition) -> Result<Definition>;
}

impl<E: Evaluator + ?Sized> Evaluator for &E {
    fn instantiate(&self, function: &FunctionSource, cell: &CellDefinition) -> Result<Definition> {
        (**self).instantiate(function, cell)
    }
}

/// Evaluator for hosts without a script engine: every user cell rejects.
#[derive(Debug, Default, Clone, Copy)]
pub struct Opaque;

impl Evaluator for Opaque {
    fn instantiate(&self, _function: &FunctionSource, cell: &CellDefinition) -> Result<Definition> {
        let name = cell.display_name().to_owned();
        Ok(Definition::new(move |_| {
            Err(RuntimeError::Evaluation(format!("no evaluator for cell `{name}`")))
        }))
    }
}

#[derive(Debug, Default, Clone)]
pub struct Intrinsics<E> {
    evaluator: E,
}

impl<E: Evaluator> Intrinsics<E> {
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }
}

impl<E: Evaluator> CellCompiler<MemoryModule> for Intrinsics<E> {
    fn compile(&self, cell: &CellDefinition, _module: &MemoryModule) -> Result<Definition> {
        let function = FunctionSource::parse(&cell.code)?;
        if function.parameters.len() != cell.references.len() {
            return Err(Error::Compile {
                name: cell.display_name().to_owned(),
                reason: format!(
                    "{} parameters for {} references",
                    function.parameters.len(),
                    cell.references.len()
                ),
            });
        }
        Ok(match Synthetic::recognize(&function) {
            Some(Synthetic::ViewValue) => Definition::new(view_value),
            Some(Synthetic::MutableWrapper) => Definition::new(mutable_wrapper),
            Some(Synthetic::MutableValue) => Definition::new(mutable_value),
            None => self.evaluator.instantiate(&function, cell)?,
        })
    }
}

/// `Generators.input(view)`: the view's current `value`.
fn view_value(inputs: &[Value]) -> Result<Value, RuntimeError> {
    match inputs {
        [Value::Intrinsic(Intrinsic::Generators), view] => Ok(match view {
            Value::Mutable(mutable) => mutable.get(),
            Value::Data(serde_json::Value::Object(object)) if object.contains_key("value") => {
                Value::Data(object["value"].clone())
            }
            other => other.clone(),
        }),
        _ => Err(RuntimeError::Evaluation("Generators.input is not a function".to_owned())),
    }
}

fn mutable_wrapper(inputs: &[Value]) -> Result<Value, RuntimeError> {
    match inputs {
        [Value::Intrinsic(Intrinsic::Mutable), initial] => {
            Ok(Value::Mutable(MutableRef::new(initial.clone())))
        }
        _ => Err(RuntimeError::Evaluation("Mutable is not a constructor".to_owned())),
    }
}

fn mutable_value(inputs: &[Value]) -> Result<Value, RuntimeError> {
    match inputs {
        [Value::Mutable(mutable)] => Ok(mutable.get()),
        [other] => Ok(other.clone()),
        _ => Err(RuntimeError::Evaluation("expected one mutable input".to_owned())),
    }
}
