use crate::descriptor::{ImportDefinition, Specifier};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Renders the import statement shown by an import's proxy node.
pub fn format_import(import: &ImportDefinition) -> String {
    let mut chunks = vec!["import".to_owned()];
    if !import.specifiers.is_empty() {
        chunks.push(format!("{{ {} }}", join(&import.specifiers)));
    }
    if !import.injections.is_empty() {
        chunks.push(format!("with {{ {} }}", join(&import.injections)));
    }
    chunks.push("from".to_owned());
    chunks.push(format!(
        "\"{}\"",
        utf8_percent_encode(&import.source, COMPONENT)
    ));
    chunks.join(" ")
}

fn join(pairs: &[Specifier]) -> String {
    pairs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
