//! Visitors over the annotated syntax tree of a single parsed cell.
//!
//! The tree itself comes from an external single-cell parser; see
//! [`ParsedCell`] for the expected shape. Value cells go through
//! [`extract_references`] and [`visit_cell_definitions`], import declarations
//! through [`visit_cell_imports`]. Both report to a [`Listener`].

use crate::descriptor::CellDescriptor;
use crate::error::Result;
use crate::listener::{CodeTreeBuilder, Listener};
use chumsky::prelude::{Rich, SimpleSpan};

mod syntax;
pub use syntax::{Cell, Node, NodeKind, ParsedCell, walk};

mod references;
pub use references::{CellCode, RESOURCE_CALLS, extract_references, function_name};

mod definitions;
pub use definitions::{Declaration, Synthetic, desugar, visit_cell_definitions};

mod imports;
pub use imports::{import_definition, visit_cell_imports};

#[cfg(test)]
pub(crate) mod fixtures;

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

/// Reports the descriptors of one parsed cell to `listener`.
pub fn parse_cell(parsed: &ParsedCell, listener: &mut (impl Listener + ?Sized)) -> Result<()> {
    if parsed.cell.body()?.kind() == NodeKind::ImportDeclaration {
        visit_cell_imports(parsed, listener)
    } else {
        visit_cell_definitions(parsed, listener)
    }
}

/// Parses a batch of cells into descriptors, in cell order.
pub fn parse_cells<'a>(cells: impl IntoIterator<Item = &'a ParsedCell>) -> Result<Vec<CellDescriptor>> {
    let mut builder = CodeTreeBuilder::new();
    for parsed in cells {
        parse_cell(parsed, &mut builder)?;
    }
    Ok(builder.into_notebook().cells)
}
