//! Borrowed view over the ESTree-style JSON tree of one parsed cell.
//!
//! Every node is a JSON object with a `type` and byte offsets `start`/`end`
//! into [`ParsedCell::input`]. Only a handful of node types matter to the
//! visitors; everything else is walked generically.

use super::Span;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCell {
    /// The cell source the node offsets point into.
    pub input: String,
    pub cell: Cell,
}

impl ParsedCell {
    pub fn new(input: impl Into<String>, cell: Cell) -> Self {
        Self {
            input: input.into(),
            cell,
        }
    }

    /// Source text covered by `node`.
    pub fn text(&self, node: Node<'_>) -> Result<&str> {
        let span = node.span();
        self.input
            .get(span.start..span.end)
            .ok_or_else(|| Error::syntax("node offsets fall outside the cell input", Some(span)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Declared name: `Identifier`, `ViewExpression` or `MutableExpression`.
    #[serde(default)]
    pub id: Option<Value>,
    pub body: Value,
    #[serde(default)]
    pub references: Vec<Value>,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default, rename = "generator")]
    pub is_generator: bool,
}

impl Cell {
    pub fn body(&self) -> Result<Node<'_>> {
        Node::new(&self.body).ok_or_else(|| Error::syntax("cell body is not a syntax node", None))
    }

    pub fn id(&self) -> Option<Node<'_>> {
        self.id.as_ref().and_then(Node::new)
    }

    pub fn references(&self) -> impl Iterator<Item = Node<'_>> {
        self.references.iter().filter_map(Node::new)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Identifier,
    ViewExpression,
    MutableExpression,
    CallExpression,
    Literal,
    BlockStatement,
    ImportDeclaration,
    Other,
}

impl NodeKind {
    fn from_type(name: &str) -> Self {
        match name {
            "Identifier" => Self::Identifier,
            "ViewExpression" => Self::ViewExpression,
            "MutableExpression" => Self::MutableExpression,
            "CallExpression" => Self::CallExpression,
            "Literal" => Self::Literal,
            "BlockStatement" => Self::BlockStatement,
            "ImportDeclaration" => Self::ImportDeclaration,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Node<'tree> {
    object: &'tree Map<String, Value>,
}

impl<'tree> Node<'tree> {
    pub fn new(value: &'tree Value) -> Option<Self> {
        let object = value.as_object()?;
        object.get("type")?.as_str()?;
        Some(Self { object })
    }

    pub fn type_name(&self) -> &'tree str {
        self.object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_type(self.type_name())
    }

    pub fn span(&self) -> Span {
        let offset = |key: &str| {
            self.object
                .get(key)
                .and_then(Value::as_u64)
                .map_or(0, |offset| offset as usize)
        };
        Span::from(offset("start")..offset("end"))
    }

    pub fn field(&self, name: &str) -> Option<Node<'tree>> {
        self.object.get(name).and_then(Node::new)
    }

    pub fn list(&self, name: &str) -> impl Iterator<Item = Node<'tree>> + use<'tree> {
        self.object
            .get(name)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Node::new)
    }

    /// The `name` of an identifier-like node.
    pub fn name(&self) -> Option<&'tree str> {
        self.object.get("name").and_then(Value::as_str)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.object
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The `value` of a `Literal` node.
    pub fn literal(&self) -> Option<&'tree Value> {
        match self.kind() {
            NodeKind::Literal => self.object.get("value"),
            _ => None,
        }
    }

    /// Direct child nodes, in field order; arrays are flattened.
    pub fn children(&self) -> impl Iterator<Item = Node<'tree>> + use<'tree> {
        self.object
            .iter()
            .filter(|(key, _)| key.as_str() != "type")
            .flat_map(|(_, value)| match value {
                Value::Array(items) => items.iter().filter_map(Node::new).collect::<Vec<_>>(),
                value => Node::new(value).into_iter().collect(),
            })
    }
}

/// Pre-order traversal of `node` and all of its descendants.
pub fn walk<'tree>(node: Node<'tree>, visit: &mut impl FnMut(Node<'tree>)) {
    visit(node);
    for child in node.children() {
        walk(child, visit);
    }
}
