//! Expands a value cell into the descriptors it declares.
//!
//! A `viewof x` cell declares two nodes (the view and its current value), a
//! `mutable x` cell three (initial value, wrapper, current value). Everything
//! else declares exactly one.

use super::references::{CellCode, extract_references, function_name};
use super::{NodeKind, ParsedCell};
use crate::descriptor::CellDefinition;
use crate::error::{Error, Result};
use crate::function::{FunctionKind, FunctionSource};
use crate::listener::Listener;

/// What a value cell declares, by its `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration<'a> {
    Anonymous,
    Plain(&'a str),
    View(&'a str),
    Mutable(&'a str),
}

impl<'a> Declaration<'a> {
    pub fn of(parsed: &'a ParsedCell) -> Result<Self> {
        let Some(id) = parsed.cell.id() else {
            return Ok(Self::Anonymous);
        };
        let missing = || Error::syntax("declaration has no name", Some(id.span()));
        Ok(match id.kind() {
            NodeKind::ViewExpression => {
                Self::View(id.field("id").and_then(|id| id.name()).ok_or_else(missing)?)
            }
            NodeKind::MutableExpression => {
                Self::Mutable(id.field("id").and_then(|id| id.name()).ok_or_else(missing)?)
            }
            _ => id.name().map_or(Self::Anonymous, Self::Plain),
        })
    }
}

/// Generated helper cells, recognizable again from their code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthetic {
    /// `x` from `viewof x`: the view's current input value.
    ViewValue,
    /// `mutable x` from `mutable initial x`: a fresh mutable cell.
    MutableWrapper,
    /// `x` from `mutable x`: the mutable's current value.
    MutableValue,
}

impl Synthetic {
    const VIEW_VALUE: (&'static [&'static str], &'static str) =
        (&["Generators", "$"], "{ return Generators.input($); }");
    const MUTABLE_WRAPPER: (&'static [&'static str], &'static str) =
        (&["Mutable", "$"], "{ return new Mutable($); }");
    const MUTABLE_VALUE: (&'static [&'static str], &'static str) =
        (&["$"], "{ return $.generator; }");

    fn template(self) -> (&'static [&'static str], &'static str) {
        match self {
            Self::ViewValue => Self::VIEW_VALUE,
            Self::MutableWrapper => Self::MUTABLE_WRAPPER,
            Self::MutableValue => Self::MUTABLE_VALUE,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::ViewValue => "value_",
            Self::MutableWrapper => "mutable_",
            Self::MutableValue => "value_",
        }
    }

    /// Function text of this helper for the cell named `name`.
    pub fn code(self, name: &str) -> String {
        let (parameters, body) = self.template();
        format!(
            "function {}({}) {}",
            function_name(&format!("{}{name}", self.prefix())),
            parameters.join(", "),
            body
        )
    }

    pub fn recognize(function: &FunctionSource) -> Option<Self> {
        if function.kind != FunctionKind::Plain {
            return None;
        }
        [Self::ViewValue, Self::MutableWrapper, Self::MutableValue]
            .into_iter()
            .find(|synthetic| {
                let (parameters, body) = synthetic.template();
                function.parameters == parameters && function.body == body
            })
    }
}

/// Descriptors declared by a cell whose code has already been extracted.
pub fn desugar(declaration: Declaration<'_>, code: CellCode) -> Vec<CellDefinition> {
    let CellCode {
        references,
        code,
        constants,
        ..
    } = code;
    let origin = |name: String| {
        CellDefinition::new(Some(name), references.clone(), code.clone())
            .with_constants(constants.clone())
    };
    let synthetic = |cell: String, references: Vec<String>, kind: Synthetic, base: &str| {
        CellDefinition::new(Some(cell), references, kind.code(base))
    };

    match declaration {
        Declaration::Anonymous => {
            vec![CellDefinition::new(None, references, code).with_constants(constants)]
        }
        Declaration::Plain(name) => vec![origin(name.to_owned())],
        Declaration::View(name) => vec![
            origin(format!("viewof {name}")),
            synthetic(
                name.to_owned(),
                vec!["Generators".to_owned(), format!("viewof {name}")],
                Synthetic::ViewValue,
                name,
            ),
        ],
        Declaration::Mutable(name) => vec![
            origin(format!("mutable initial {name}")),
            synthetic(
                format!("mutable {name}"),
                vec!["Mutable".to_owned(), format!("mutable initial {name}")],
                Synthetic::MutableWrapper,
                name,
            ),
            synthetic(
                name.to_owned(),
                vec![format!("mutable {name}")],
                Synthetic::MutableValue,
                name,
            ),
        ],
    }
}

pub fn visit_cell_definitions(
    parsed: &ParsedCell,
    listener: &mut (impl Listener + ?Sized),
) -> Result<()> {
    let declaration = Declaration::of(parsed)?;
    let code = extract_references(parsed)?;
    for cell in desugar(declaration, code) {
        listener.on_cell(cell)?;
    }
    Ok(())
}
