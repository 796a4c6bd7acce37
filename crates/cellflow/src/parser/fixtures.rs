//! Builders for hand-annotated cell trees, positioned against real source text.

use super::{Cell, ParsedCell};
use serde_json::{Value, json};

pub struct Fixture {
    input: String,
}

impl Fixture {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.to_owned(),
        }
    }

    /// Byte range of the `nth` occurrence of `needle`.
    pub fn at(&self, needle: &str, nth: usize) -> (usize, usize) {
        let start = self
            .input
            .match_indices(needle)
            .nth(nth)
            .map(|(start, _)| start)
            .unwrap_or_else(|| panic!("`{needle}` #{nth} not in `{}`", self.input));
        (start, start + needle.len())
    }

    pub fn whole(&self) -> (usize, usize) {
        (0, self.input.len())
    }

    /// From the first occurrence of `needle` to the end of the input.
    pub fn tail(&self, needle: &str) -> (usize, usize) {
        (self.at(needle, 0).0, self.input.len())
    }

    pub fn node(&self, kind: &str, (start, end): (usize, usize), fields: Value) -> Value {
        let mut object = fields.as_object().cloned().unwrap_or_default();
        object.insert("type".to_owned(), json!(kind));
        object.insert("start".to_owned(), json!(start));
        object.insert("end".to_owned(), json!(end));
        Value::Object(object)
    }

    pub fn identifier(&self, name: &str, nth: usize) -> Value {
        self.node("Identifier", self.at(name, nth), json!({ "name": name }))
    }

    pub fn view(&self, name: &str, nth: usize) -> Value {
        self.decorated("ViewExpression", "viewof", name, nth)
    }

    pub fn mutable(&self, name: &str, nth: usize) -> Value {
        self.decorated("MutableExpression", "mutable", name, nth)
    }

    fn decorated(&self, kind: &str, keyword: &str, name: &str, nth: usize) -> Value {
        let (start, end) = self.at(&format!("{keyword} {name}"), nth);
        let id = self.node(
            "Identifier",
            (end - name.len(), end),
            json!({ "name": name }),
        );
        self.node(kind, (start, end), json!({ "id": id }))
    }

    pub fn literal(&self, raw: &str, value: Value, nth: usize) -> Value {
        self.node("Literal", self.at(raw, nth), json!({ "value": value, "raw": raw }))
    }

    pub fn string_literal(&self, quoted: &str, nth: usize) -> Value {
        let value = quoted.trim_matches(|c| c == '"' || c == '\'');
        self.literal(quoted, json!(value), nth)
    }

    /// `callee(arguments…)` where the call ends at the first `)` after the callee.
    pub fn call(&self, callee: &str, nth: usize, arguments: Vec<Value>) -> Value {
        let (start, callee_end) = self.at(callee, nth);
        let end = self.input[callee_end..]
            .find(')')
            .map(|offset| callee_end + offset + 1)
            .unwrap_or(self.input.len());
        self.node(
            "CallExpression",
            (start, end),
            json!({
                "callee": self.node("Identifier", (start, callee_end), json!({ "name": callee })),
                "arguments": arguments,
            }),
        )
    }

    pub fn specifier(&self, imported: &str, local: &str, nth: usize) -> Value {
        self.import_specifier(None, imported, local, nth)
    }

    /// Specifier prefixed with `viewof` or `mutable`.
    pub fn decorated_specifier(&self, flag: &str, imported: &str, local: &str, nth: usize) -> Value {
        self.import_specifier(Some(flag), imported, local, nth)
    }

    fn import_specifier(&self, flag: Option<&str>, imported: &str, local: &str, nth: usize) -> Value {
        let imported_node = self.identifier(imported, nth);
        let (start, imported_end) = self.at(imported, nth);
        let local_node = if imported == local {
            imported_node.clone()
        } else {
            let offset = self.input[imported_end..]
                .find(local)
                .map_or(imported_end, |offset| imported_end + offset);
            self.node(
                "Identifier",
                (offset, offset + local.len()),
                json!({ "name": local }),
            )
        };
        let end = local_node["end"].as_u64().unwrap_or(0) as usize;
        let mut fields = json!({ "imported": imported_node, "local": local_node });
        if let Some(flag) = flag {
            fields[flag] = json!(true);
        }
        self.node("ImportSpecifier", (start, end), fields)
    }

    pub fn cell(&self, id: Option<Value>, body: Value, references: Vec<Value>) -> ParsedCell {
        self.qualified_cell(id, body, references, false, false)
    }

    pub fn qualified_cell(
        &self,
        id: Option<Value>,
        body: Value,
        references: Vec<Value>,
        is_async: bool,
        is_generator: bool,
    ) -> ParsedCell {
        ParsedCell::new(
            self.input.clone(),
            Cell {
                id,
                body,
                references,
                is_async,
                is_generator,
            },
        )
    }
}
