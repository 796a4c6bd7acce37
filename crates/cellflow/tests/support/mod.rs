//! Shared helpers: annotated cell trees and a scripted evaluator.
#![allow(dead_code)]

use cellflow::function::FunctionSource;
use cellflow::parser::{Cell, ParsedCell};
use cellflow::runtime::{
    Definition, Evaluator, MemoryModule, MemoryRuntime, Observer, RuntimeError, Value,
};
use cellflow::{CellDefinition, Error};
use serde_json::{Value as Json, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Positions syntax nodes against a cell's source text.
pub struct Source(pub String);

impl Source {
    pub fn new(input: &str) -> Self {
        Self(input.to_owned())
    }

    pub fn at(&self, needle: &str, nth: usize) -> (usize, usize) {
        let start = self
            .0
            .match_indices(needle)
            .nth(nth)
            .map(|(start, _)| start)
            .unwrap_or_else(|| panic!("`{needle}` #{nth} not in `{}`", self.0));
        (start, start + needle.len())
    }

    /// From the first `{` to the last `}`.
    pub fn block(&self) -> (usize, usize) {
        let start = self.0.find('{').unwrap_or(0);
        let end = self.0.rfind('}').map_or(self.0.len(), |end| end + 1);
        (start, end)
    }

    pub fn node(&self, kind: &str, (start, end): (usize, usize), fields: Json) -> Json {
        let mut object = fields.as_object().cloned().unwrap_or_default();
        object.insert("type".to_owned(), json!(kind));
        object.insert("start".to_owned(), json!(start));
        object.insert("end".to_owned(), json!(end));
        Json::Object(object)
    }

    pub fn identifier(&self, name: &str, nth: usize) -> Json {
        self.node("Identifier", self.at(name, nth), json!({ "name": name }))
    }

    pub fn mutable(&self, name: &str, nth: usize) -> Json {
        let (start, end) = self.at(&format!("mutable {name}"), nth);
        let id = self.node("Identifier", (end - name.len(), end), json!({ "name": name }));
        self.node("MutableExpression", (start, end), json!({ "id": id }))
    }

    pub fn string(&self, quoted: &str) -> Json {
        let value = quoted.trim_matches(|c| c == '"' || c == '\'');
        self.node("Literal", self.at(quoted, 0), json!({ "value": value, "raw": quoted }))
    }

    pub fn cell(&self, id: Option<Json>, body: Json, references: Vec<Json>) -> ParsedCell {
        ParsedCell::new(
            self.0.clone(),
            Cell {
                id,
                body,
                references,
                is_async: false,
                is_generator: false,
            },
        )
    }
}

/// `mutable myA = 'aa'`
pub fn initial_mutable() -> ParsedCell {
    let source = Source::new("mutable myA = 'aa'");
    source.cell(Some(source.mutable("myA", 0)), source.string("'aa'"), vec![])
}

/// `{ mutable myA = 'Hello, world!' }`
pub fn assigning_block() -> ParsedCell {
    let source = Source::new("{ mutable myA = 'Hello, world!' }");
    let target = source.mutable("myA", 0);
    let assignment = source.node(
        "AssignmentExpression",
        (2, source.at("'Hello, world!'", 0).1),
        json!({ "left": target.clone(), "right": source.string("'Hello, world!'") }),
    );
    let body = source.node(
        "BlockStatement",
        source.block(),
        json!({ "body": [source.node("ExpressionStatement", (2, 31), json!({ "expression": assignment }))] }),
    );
    source.cell(None, body, vec![target])
}

type Script = Rc<dyn Fn(&[Value], &Value) -> Result<Value, RuntimeError>>;

/// Stands in for a script engine: function bodies are matched by substring.
#[derive(Clone, Default)]
pub struct ScriptedEvaluator {
    receiver: Value,
    scripts: Vec<(String, Script)>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `this` every script sees.
    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn script(
        mut self,
        body_contains: &str,
        script: impl Fn(&[Value], &Value) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        self.scripts.push((body_contains.to_owned(), Rc::new(script)));
        self
    }

    /// Evaluator for [`initial_mutable`] and [`assigning_block`].
    pub fn assigning() -> Self {
        Self::new()
            .script("return ('aa')", |_, _| Ok(Value::from("aa")))
            .script("$0.value = 'Hello, world!'", |inputs, _| {
                if let Some(mutable) = inputs[0].as_mutable() {
                    mutable.set(Value::from("Hello, world!"));
                }
                Ok(Value::Undefined)
            })
    }
}

impl Evaluator for ScriptedEvaluator {
    fn instantiate(&self, function: &FunctionSource, cell: &CellDefinition) -> cellflow::Result<Definition> {
        let script = self
            .scripts
            .iter()
            .find(|(needle, _)| function.body.contains(needle.as_str()))
            .map(|(_, script)| script.clone())
            .ok_or_else(|| Error::Compile {
                name: cell.display_name().to_owned(),
                reason: format!("no script for `{}`", function.body),
            })?;
        let receiver = self.receiver.clone();
        Ok(Definition::new(move |inputs| script(inputs, &receiver)))
    }
}

/// Records every notification as `name:event`.
#[derive(Default)]
pub struct Journal(RefCell<Vec<String>>);

impl Journal {
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn observer(self: &Rc<Self>, name: Option<&str>) -> Rc<dyn Observer> {
        Rc::new(Entry {
            journal: self.clone(),
            name: name.unwrap_or("<anonymous>").to_owned(),
        })
    }
}

struct Entry {
    journal: Rc<Journal>,
    name: String,
}

impl Observer for Entry {
    fn fulfilled(&self, value: &Value) {
        self.journal
            .0
            .borrow_mut()
            .push(format!("{}:{}", self.name, value.to_json()));
    }

    fn rejected(&self, error: &RuntimeError) {
        self.journal
            .0
            .borrow_mut()
            .push(format!("{}:error:{error}", self.name));
    }
}

/// Hands out prebuilt modules by source, remembering what was asked.
#[derive(Default)]
pub struct Library {
    modules: HashMap<String, MemoryModule>,
    requests: RefCell<Vec<String>>,
}

impl Library {
    pub fn with(mut self, source: &str, module: MemoryModule) -> Self {
        self.modules.insert(source.to_owned(), module);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl cellflow::compiler::Resolver<MemoryRuntime> for Library {
    async fn resolve(
        &self,
        request: cellflow::compiler::ImportRequest<'_, MemoryRuntime>,
    ) -> cellflow::Result<MemoryModule> {
        self.requests.borrow_mut().push(request.source.to_owned());
        self.modules
            .get(request.source)
            .cloned()
            .ok_or_else(|| Error::resolve(request.source, "not in the library"))
    }
}
