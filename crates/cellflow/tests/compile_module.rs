mod support;

use cellflow::compiler::{ImportRequest, Resolver};
use cellflow::descriptor::{CellDefinition, ImportDefinition};
use cellflow::runtime::{
    Definition, Intrinsics, MemoryModule, MemoryRuntime, Module, Runtime, Value, Variable,
};
use cellflow::{CompileOptions, Error, GraphCompiler, Listener, Specifier, parse_cell};
use serde_json::json;
use std::cell::RefCell;
use support::{Library, ScriptedEvaluator, assigning_block, initial_mutable};

type Compiler = GraphCompiler<MemoryRuntime, Intrinsics<ScriptedEvaluator>>;

fn compiler(runtime: MemoryRuntime, evaluator: ScriptedEvaluator) -> Compiler {
    GraphCompiler::new(runtime, CompileOptions::new(Intrinsics::new(evaluator)))
}

fn constant_cell(name: &str, value: i64) -> CellDefinition {
    CellDefinition::new(
        Some(name.to_owned()),
        vec![],
        format!("function {name}() {{\nreturn ({value});\n}}"),
    )
}

fn constants() -> ScriptedEvaluator {
    ScriptedEvaluator::new().script("return (", |_, _| Ok(Value::Undefined))
}

fn import(source: &str, specifiers: &[(&str, &str)]) -> ImportDefinition {
    ImportDefinition {
        source: source.to_owned(),
        specifiers: specifiers
            .iter()
            .map(|(name, alias)| Specifier::new(*name, *alias))
            .collect(),
        injections: vec![],
    }
}

#[tokio::test]
async fn finalize_returns_the_populated_module() {
    let mut compiler = compiler(MemoryRuntime::new(), ScriptedEvaluator::assigning());
    for cell in [initial_mutable(), assigning_block()] {
        parse_cell(&cell, &mut compiler).unwrap();
    }
    let module = compiler.finalize(&Library::default()).await.unwrap();
    assert_eq!(module.value("myA").unwrap(), Value::from("Hello, world!"));
    assert_eq!(compiler.variables().len(), 4);
}

/// Records whether the target module already holds `late` when asked.
#[derive(Default)]
struct Probe(RefCell<Vec<bool>>);

impl Resolver<MemoryRuntime> for Probe {
    async fn resolve(&self, request: ImportRequest<'_, MemoryRuntime>) -> cellflow::Result<MemoryModule> {
        self.0.borrow_mut().push(request.module.contains("late"));
        Ok(request.runtime.module())
    }
}

#[tokio::test]
async fn value_cells_register_before_any_import_resolves() {
    let mut compiler = compiler(MemoryRuntime::new(), constants());
    compiler.on_import(import("first", &[])).unwrap();
    compiler.on_cell(constant_cell("late", 1)).unwrap();
    compiler.on_import(import("second", &[])).unwrap();

    let probe = Probe::default();
    compiler.finalize(&probe).await.unwrap();
    assert_eq!(*probe.0.borrow(), [true, true]);
    assert_eq!(compiler.imports().len(), 2);
}

#[tokio::test]
async fn resolver_failure_halts_remaining_imports() {
    let runtime = MemoryRuntime::new();
    let present = runtime.module();
    let library = Library::default().with("present", present);

    let evaluator = ScriptedEvaluator::new().script("return (7)", |_, _| Ok(Value::from(json!(7))));
    let mut compiler = compiler(runtime, evaluator);
    compiler.on_import(import("missing", &[("a", "a")])).unwrap();
    compiler.on_import(import("present", &[("b", "b")])).unwrap();
    compiler.on_cell(constant_cell("c", 7)).unwrap();

    let Err(error) = compiler.finalize(&library).await else {
        panic!("finalize should fail on the missing notebook");
    };
    assert!(matches!(error, Error::Resolve { ref module, .. } if module == "missing"));
    assert_eq!(library.requests(), ["missing"]);
    let queued: Vec<_> = compiler.pending_imports().map(|i| i.source.as_str()).collect();
    assert_eq!(queued, ["missing", "present"]);
    assert!(compiler.imports().is_empty());
    assert_eq!(compiler.module().value("c").unwrap(), Value::from(json!(7)));
}

#[tokio::test]
async fn injections_rebind_names_inside_a_derived_copy() {
    let runtime = MemoryRuntime::new();
    let library = runtime.module();
    library
        .variable(None)
        .define(Some("data"), &[], Definition::constant(json!(1)))
        .unwrap();
    library
        .variable(None)
        .define(
            Some("chart"),
            &["data".to_owned()],
            Definition::new(|inputs| {
                let data = inputs[0].as_data().and_then(|data| data.as_i64()).unwrap_or_default();
                Ok(Value::from(json!(data * 10)))
            }),
        )
        .unwrap();
    let resolver = Library::default().with("@owner/charts", library.clone());

    let evaluator = ScriptedEvaluator::new().script("return (5)", |_, _| Ok(Value::from(json!(5))));
    let mut compiler = compiler(runtime, evaluator);
    compiler.on_cell(constant_cell("rows", 5)).unwrap();
    compiler
        .on_import(ImportDefinition {
            source: "@owner/charts".to_owned(),
            specifiers: vec![Specifier::new("chart", "chart")],
            injections: vec![Specifier::new("rows", "data")],
        })
        .unwrap();
    let module = compiler.finalize(&resolver).await.unwrap();

    assert_eq!(module.value("chart").unwrap(), Value::from(json!(50)));
    assert_eq!(library.value("chart").unwrap(), Value::from(json!(10)));
}

#[tokio::test]
async fn removing_an_import_deletes_its_nodes() {
    let runtime = MemoryRuntime::new();
    let library = runtime.module();
    library
        .variable(None)
        .define(Some("x"), &[], Definition::constant(json!(1)))
        .unwrap();
    let resolver = Library::default().with("lib", library);

    let mut compiler = compiler(runtime, constants());
    compiler.on_import(import("lib", &[("x", "x"), ("x", "y")])).unwrap();
    let module = compiler.finalize(&resolver).await.unwrap();
    assert!(module.contains("x") && module.contains("y"));
    assert_eq!(module.variables().len(), 3);

    assert_eq!(compiler.remove_import(0).as_deref(), Some("lib"));
    assert!(!module.contains("x"));
    assert!(!module.contains("y"));
    assert!(module.variables().is_empty());
    assert_eq!(compiler.remove_import(0), None);
    assert!(compiler.into_compiled().variables.is_empty());
}
