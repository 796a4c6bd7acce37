//! Turns a value cell into function text over its free references.
//!
//! Each distinct reference becomes one parameter. Plain identifiers keep
//! their own name; `viewof x`, `mutable x` and anything without a usable name
//! get a positional token (`$0`, `$1`, …). Every occurrence in the body is
//! rewritten to that token, with `.value` appended for mutables. Byte offsets
//! in the tree locate the occurrences.

use super::{Node, NodeKind, ParsedCell, Span, walk};
use crate::descriptor::Constants;
use crate::error::{Error, Result};
use crate::function::{FunctionKind, FunctionSource};
use indexmap::IndexMap;
use log::{trace, warn};
use std::collections::{BTreeMap, HashMap};

/// Calls whose literal first argument is recorded as a constant.
pub const RESOURCE_CALLS: [&str; 3] = ["FileAttachment", "Secret", "DatabaseClient"];

#[derive(Debug, Clone, PartialEq)]
pub struct CellCode {
    /// Canonical names, deduplicated, in first-occurrence order.
    pub references: Vec<String>,
    /// Parameter tokens, parallel to `references`.
    pub parameters: Vec<String>,
    pub code: String,
    pub constants: Option<Constants>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Plain,
    View,
    Mutable,
}

impl Form {
    fn of(node: Node<'_>) -> Self {
        match node.kind() {
            NodeKind::ViewExpression => Self::View,
            NodeKind::MutableExpression => Self::Mutable,
            NodeKind::Identifier => Self::Plain,
            _ => {
                warn!(
                    "unsupported reference form `{}`, treating it as a plain reference",
                    node.type_name()
                );
                Self::Plain
            }
        }
    }

    /// Text standing in for an occurrence of this form in the body.
    fn replacement(self, token: &str) -> Option<String> {
        match self {
            Self::Plain => None,
            Self::View => Some(token.to_owned()),
            Self::Mutable => Some(format!("{token}.value")),
        }
    }

    fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::View => Some("viewof "),
            Self::Mutable => Some("mutable "),
        }
    }
}

/// Name of the binding inside a reference or declaration node.
fn inner_name(node: Node<'_>) -> Option<&str> {
    match node.kind() {
        NodeKind::ViewExpression | NodeKind::MutableExpression => node.field("id")?.name(),
        _ => node.name(),
    }
}

/// `x`, `viewof x` or `mutable x`.
fn canonical_name(node: Node<'_>, form: Form) -> Option<String> {
    let name = inner_name(node)?;
    Some(match form.prefix() {
        Some(prefix) => format!("{prefix}{name}"),
        None => name.to_owned(),
    })
}

/// Function name for a declared cell name.
///
/// `mutable x` becomes `mutable_initial_x`; remaining whitespace becomes `_`.
pub fn function_name(declared: &str) -> String {
    let name = match declared.strip_prefix("mutable ") {
        Some(rest) => format!("mutable_initial_{rest}"),
        None => declared.to_owned(),
    };
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

pub fn extract_references(parsed: &ParsedCell) -> Result<CellCode> {
    let cell = &parsed.cell;
    let body = cell.body()?;
    let body_span = body.span();
    let body_text = parsed.text(body)?;

    let mut tokens = HashMap::<String, String>::new();
    let mut references = Vec::new();
    let mut parameters = Vec::new();
    let mut replacements = BTreeMap::<usize, (usize, String)>::new();
    let mut anonymous = 0;

    for reference in cell.references() {
        let form = Form::of(reference);
        let canonical = canonical_name(reference, form);
        let known = canonical.as_ref().and_then(|name| tokens.get(name)).cloned();
        let token = match (known, form, reference.name()) {
            (Some(token), _, _) => token,
            (None, Form::Plain, Some(name)) => name.to_owned(),
            _ => {
                let token = format!("${anonymous}");
                anonymous += 1;
                token
            }
        };

        if let Some(replacement) = form.replacement(&token) {
            let name = inner_name(reference);
            let kind = reference.kind();
            let mut error = None;
            walk(body, &mut |node| {
                if error.is_some() || node.kind() != kind || inner_name(node) != name {
                    return;
                }
                match relative(node.span(), body_span, body_text) {
                    Ok((start, end)) => {
                        replacements.insert(start, (end, replacement.clone()));
                    }
                    Err(e) => error = Some(e),
                }
            });
            if let Some(error) = error {
                return Err(error);
            }
        }

        let canonical = canonical.unwrap_or_else(|| token.clone());
        if !tokens.contains_key(&canonical) {
            trace!("reference `{canonical}` bound to `{token}`");
            tokens.insert(canonical.clone(), token.clone());
            references.push(canonical);
            parameters.push(token);
        }
    }

    let text = rewrite(body_text, &replacements);
    let block = match body.kind() {
        NodeKind::BlockStatement => text,
        _ => FunctionSource::expression_body(&text),
    };
    let name = cell
        .id()
        .and_then(|id| canonical_name(id, Form::of(id)))
        .map(|declared| function_name(&declared))
        .unwrap_or_default();
    let function = FunctionSource::new(
        FunctionKind::new(cell.is_async, cell.is_generator),
        name,
        parameters.clone(),
        block,
    );

    Ok(CellCode {
        references,
        parameters,
        code: function.to_string(),
        constants: collect_constants(body),
    })
}

/// Offsets of `span` relative to the body text.
fn relative(span: Span, body: Span, body_text: &str) -> Result<(usize, usize)> {
    let outside = || Error::syntax("reference occurrence falls outside the cell body", Some(span));
    let start = span.start.checked_sub(body.start).ok_or_else(outside)?;
    let end = span.end.checked_sub(body.start).ok_or_else(outside)?;
    body_text.get(start..end).ok_or_else(outside)?;
    Ok((start, end))
}

/// Applies non-overlapping replacements in offset order.
fn rewrite(text: &str, replacements: &BTreeMap<usize, (usize, String)>) -> String {
    let mut out = text.to_owned();
    let mut shift = 0isize;
    let mut covered = 0;
    for (&start, (end, replacement)) in replacements {
        if start < covered {
            continue;
        }
        let from = start.saturating_add_signed(shift);
        let to = end.saturating_add_signed(shift);
        out.replace_range(from..to, replacement);
        shift += replacement.len() as isize - (end - start) as isize;
        covered = *end;
    }
    out
}

fn collect_constants(body: Node<'_>) -> Option<Constants> {
    let mut calls = Vec::new();
    walk(body, &mut |node| {
        if node.kind() != NodeKind::CallExpression {
            return;
        }
        let Some(callee) = node.field("callee").and_then(|callee| callee.name()) else {
            return;
        };
        if !RESOURCE_CALLS.contains(&callee) {
            return;
        }
        let argument = node.list("arguments").next().and_then(|argument| argument.literal());
        calls.push((node.span().start, callee, argument));
    });
    if calls.is_empty() {
        return None;
    }
    calls.sort_by_key(|(start, _, _)| *start);

    let mut constants = Constants::new();
    for (_, callee, argument) in calls {
        let literals = constants.entry(callee.to_owned()).or_insert_with(IndexMap::new);
        if let Some(value) = argument {
            literals.insert(literal_key(value), value.clone());
        }
    }
    Some(constants)
}

fn literal_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
