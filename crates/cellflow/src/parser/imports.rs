//! Import cells: `import {…} with {…} from "…"`.
//!
//! A `viewof` or `mutable` binding also brings in its decorated variable, so
//! it yields two pairs. Injections follow the same rules as specifiers.

use super::{Node, NodeKind, ParsedCell};
use crate::descriptor::{ImportDefinition, Specifier};
use crate::error::{Error, Result};
use crate::listener::Listener;

/// Reads an `import {…} with {…} from "…"` cell.
pub fn import_definition(parsed: &ParsedCell) -> Result<ImportDefinition> {
    let body = parsed.cell.body()?;
    if body.kind() != NodeKind::ImportDeclaration {
        return Err(Error::syntax(
            format!("expected an import declaration, found `{}`", body.type_name()),
            Some(body.span()),
        ));
    }
    let source = body
        .field("source")
        .and_then(|source| source.literal())
        .and_then(|literal| literal.as_str())
        .ok_or_else(|| Error::syntax("import has no string source", Some(body.span())))?;

    Ok(ImportDefinition {
        source: source.to_owned(),
        specifiers: bindings(body.list("specifiers"))?,
        injections: bindings(body.list("injections"))?,
    })
}

pub fn visit_cell_imports(parsed: &ParsedCell, listener: &mut (impl Listener + ?Sized)) -> Result<()> {
    listener.on_import(import_definition(parsed)?)
}

/// Binding pairs, with the `viewof`/`mutable` pair ahead of the plain one.
fn bindings<'tree>(nodes: impl Iterator<Item = Node<'tree>>) -> Result<Vec<Specifier>> {
    let mut pairs = Vec::new();
    for node in nodes {
        let imported = node
            .field("imported")
            .and_then(|imported| imported.name())
            .ok_or_else(|| Error::syntax("import binding has no imported name", Some(node.span())))?;
        let local = node
            .field("local")
            .and_then(|local| local.name())
            .unwrap_or(imported);

        if node.flag("view") {
            pairs.push(Specifier::new(format!("viewof {imported}"), format!("viewof {local}")));
        } else if node.flag("mutable") {
            pairs.push(Specifier::new(format!("mutable {imported}"), format!("mutable {local}")));
        }
        pairs.push(Specifier::new(imported, local));
    }
    Ok(pairs)
}
