//! In-process reference runtime.
//!
//! Variables live in a generational arena; each module is a name scope
//! over it where the last registration of a name wins. Values are pulled on
//! demand and cached against a stamp of their inputs, so a variable reruns
//! only when an input value (or a mutable's version) changed.
//!
//! [`MemoryModule::value`] first settles the graph: observed and anonymous
//! variables are re-evaluated until a pass reruns nothing. Anonymous cells
//! exist for their effects, which is why they are always computed.

use super::arena::{Arena, SlotId};
use super::intrinsics::Definition;
use super::value::{Intrinsic, Value};
use super::{Module, Runtime, RuntimeError, Variable};
use crate::config::RuntimeConfig;
use crate::descriptor::Specifier;
use log::{debug, trace};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Notified whenever an observed variable settles on a new result.
pub trait Observer {
    fn pending(&self) {}
    fn fulfilled(&self, _value: &Value) {}
    fn rejected(&self, _error: &RuntimeError) {}
}

type ModuleId = usize;

#[derive(Clone)]
pub struct MemoryRuntime {
    state: Rc<State>,
}

struct State {
    config: RuntimeConfig,
    builtins: HashMap<&'static str, Value>,
    variables: RefCell<Arena<Node>>,
    scopes: RefCell<Vec<HashMap<String, SlotId>>>,
    /// Bumped on every recomputation; a pass that leaves it alone has settled.
    runs: Cell<u64>,
}

#[derive(Clone)]
enum Rule {
    Undefined,
    Define(Definition),
    Import { name: String, from: ModuleId },
}

struct Node {
    module: ModuleId,
    name: Option<String>,
    inputs: Vec<String>,
    rule: Rule,
    observer: Option<Rc<dyn Observer>>,
    cache: Option<Cache>,
}

struct Cache {
    stamps: Vec<Stamp>,
    result: Result<Value, RuntimeError>,
}

#[derive(Clone, PartialEq)]
struct Stamp {
    value: Result<Value, RuntimeError>,
    version: u64,
}

/// Row of [`MemoryModule::variables`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: Option<String>,
    pub inputs: Vec<String>,
    /// Name read from the source module, for imported variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<String>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let builtins = [Intrinsic::Generators, Intrinsic::Mutable]
            .into_iter()
            .map(|intrinsic| (intrinsic.name(), Value::Intrinsic(intrinsic)))
            .collect();
        Self {
            state: Rc::new(State {
                config,
                builtins,
                variables: RefCell::new(Arena::new()),
                scopes: RefCell::new(Vec::new()),
                runs: Cell::new(0),
            }),
        }
    }

    /// Re-evaluates observed and anonymous variables until nothing reruns.
    pub fn settle(&self) -> Result<(), RuntimeError> {
        let max_passes = self.state.config.max_passes;
        for pass in 0..max_passes {
            let before = self.state.runs.get();
            let roots: Vec<SlotId> = self
                .state
                .variables
                .borrow()
                .iter()
                .filter(|(_, node)| node.observer.is_some() || node.name.is_none())
                .map(|(slot, _)| slot)
                .collect();
            for slot in roots {
                if let Err(error) = self.evaluate(slot, &mut Vec::new()) {
                    trace!("{} rejected: {error}", self.label(slot));
                }
            }
            if self.state.runs.get() == before {
                trace!(
                    "settled after {pass} passes over {} variables",
                    self.state.variables.borrow().len()
                );
                return Ok(());
            }
        }
        Err(RuntimeError::Unsettled(max_passes))
    }

    fn new_module(&self) -> ModuleId {
        let mut scopes = self.state.scopes.borrow_mut();
        scopes.push(HashMap::new());
        scopes.len() - 1
    }

    fn alloc(&self, module: ModuleId, observer: Option<Rc<dyn Observer>>) -> SlotId {
        self.state.variables.borrow_mut().alloc(Node {
            module,
            name: None,
            inputs: Vec::new(),
            rule: Rule::Undefined,
            observer,
            cache: None,
        })
    }

    fn define(
        &self,
        slot: SlotId,
        name: Option<&str>,
        inputs: &[String],
        rule: Rule,
    ) -> Result<(), RuntimeError> {
        let observer = {
            let mut variables = self.state.variables.borrow_mut();
            let node = variables.get_mut(slot).ok_or(RuntimeError::Deleted)?;
            let mut scopes = self.state.scopes.borrow_mut();
            let scope = &mut scopes[node.module];
            if let Some(previous) = node.name.take() {
                if scope.get(&previous) == Some(&slot) {
                    scope.remove(&previous);
                }
            }
            if let Some(name) = name {
                if scope.insert(name.to_owned(), slot).is_some() {
                    debug!("`{name}` redefined in module {}", node.module);
                }
            }
            node.name = name.map(str::to_owned);
            node.inputs = inputs.to_vec();
            node.rule = rule;
            node.cache = None;
            node.observer.clone()
        };
        if let Some(observer) = observer {
            observer.pending();
        }
        Ok(())
    }

    fn delete(&self, slot: SlotId) {
        let Some(node) = self.state.variables.borrow_mut().free(slot) else {
            return;
        };
        if let Some(name) = node.name {
            let mut scopes = self.state.scopes.borrow_mut();
            let scope = &mut scopes[node.module];
            if scope.get(&name) == Some(&slot) {
                scope.remove(&name);
            }
        }
    }

    fn lookup(&self, module: ModuleId, name: &str) -> Option<SlotId> {
        self.state.scopes.borrow().get(module)?.get(name).copied()
    }

    fn label(&self, slot: SlotId) -> String {
        self.state
            .variables
            .borrow()
            .get(slot)
            .and_then(|node| node.name.clone())
            .unwrap_or_else(|| "<anonymous>".to_owned())
    }

    fn stamp(&self, module: ModuleId, name: &str, visiting: &mut Vec<SlotId>) -> Stamp {
        let value = match self.lookup(module, name) {
            Some(slot) => self.evaluate(slot, visiting),
            None => self
                .state
                .builtins
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::NotDefined(name.to_owned())),
        };
        let version = value.as_ref().map_or(0, Value::version);
        Stamp { value, version }
    }

    fn evaluate(&self, slot: SlotId, visiting: &mut Vec<SlotId>) -> Result<Value, RuntimeError> {
        if visiting.contains(&slot) {
            return Err(RuntimeError::Circular(self.label(slot)));
        }
        let (module, inputs, rule) = {
            let variables = self.state.variables.borrow();
            let node = variables.get(slot).ok_or(RuntimeError::Deleted)?;
            (node.module, node.inputs.clone(), node.rule.clone())
        };

        visiting.push(slot);
        let stamps: Vec<Stamp> = match &rule {
            Rule::Import { name, from } => vec![self.stamp(*from, name, visiting)],
            _ => inputs
                .iter()
                .map(|input| self.stamp(module, input, visiting))
                .collect(),
        };
        visiting.pop();

        if let Some(cache) = self
            .state
            .variables
            .borrow()
            .get(slot)
            .and_then(|node| node.cache.as_ref())
        {
            if cache.stamps == stamps {
                return cache.result.clone();
            }
        }

        self.state.runs.set(self.state.runs.get() + 1);
        let result = match &rule {
            Rule::Undefined => Ok(Value::Undefined),
            Rule::Import { .. } => stamps[0].value.clone(),
            Rule::Define(definition) => stamps
                .iter()
                .map(|stamp| stamp.value.clone())
                .collect::<Result<Vec<_>, _>>()
                .and_then(|values| definition.call(&values)),
        };

        let observer = {
            let mut variables = self.state.variables.borrow_mut();
            let Some(node) = variables.get_mut(slot) else {
                return result;
            };
            let changed = node
                .cache
                .as_ref()
                .is_none_or(|cache| cache.result != result);
            node.cache = Some(Cache {
                stamps,
                result: result.clone(),
            });
            node.observer.clone().filter(|_| changed)
        };
        if let Some(observer) = observer {
            match &result {
                Ok(value) => observer.fulfilled(value),
                Err(error) => observer.rejected(error),
            }
        }
        result
    }
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for MemoryRuntime {
    type Module = MemoryModule;

    fn module(&self) -> MemoryModule {
        MemoryModule {
            runtime: self.clone(),
            id: self.new_module(),
        }
    }
}

#[derive(Clone)]
pub struct MemoryModule {
    runtime: MemoryRuntime,
    id: ModuleId,
}

impl MemoryModule {
    pub fn runtime(&self) -> &MemoryRuntime {
        &self.runtime
    }

    /// Settles the graph, then reads the variable registered as `name`.
    pub fn value(&self, name: &str) -> Result<Value, RuntimeError> {
        self.runtime.settle()?;
        let slot = self
            .runtime
            .lookup(self.id, name)
            .ok_or_else(|| RuntimeError::NotDefined(name.to_owned()))?;
        self.runtime.evaluate(slot, &mut Vec::new())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.runtime.lookup(self.id, name).is_some()
    }

    /// Live variables of this module, in slot order.
    pub fn variables(&self) -> Vec<VariableInfo> {
        self.runtime
            .state
            .variables
            .borrow()
            .iter()
            .filter(|(_, node)| node.module == self.id)
            .map(|(_, node)| VariableInfo {
                name: node.name.clone(),
                inputs: node.inputs.clone(),
                import: match &node.rule {
                    Rule::Import { name, .. } => Some(name.clone()),
                    _ => None,
                },
            })
            .collect()
    }

    fn bind(&self, name: &str, inputs: Vec<String>, rule: Rule) {
        let slot = self.runtime.alloc(self.id, None);
        let mut variables = self.runtime.state.variables.borrow_mut();
        if let Some(node) = variables.get_mut(slot) {
            node.name = Some(name.to_owned());
            node.inputs = inputs;
            node.rule = rule;
        }
        self.runtime.state.scopes.borrow_mut()[self.id].insert(name.to_owned(), slot);
    }
}

impl fmt::Debug for MemoryModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryModule").field("id", &self.id).finish()
    }
}

impl Module for MemoryModule {
    type Variable = MemoryVariable;
    type Definition = Definition;
    type Observer = Rc<dyn Observer>;

    fn variable(&self, observer: Option<Rc<dyn Observer>>) -> MemoryVariable {
        MemoryVariable {
            runtime: self.runtime.clone(),
            slot: self.runtime.alloc(self.id, observer),
        }
    }

    fn derive(&self, injections: &[Specifier], from: &Self) -> Self {
        let derived = self.runtime.module();
        let copies: Vec<(String, Vec<String>, Rule)> = {
            let scopes = self.runtime.state.scopes.borrow();
            let variables = self.runtime.state.variables.borrow();
            variables
                .iter()
                .filter_map(|(slot, node)| {
                    let name = node.name.as_ref()?;
                    (scopes[self.id].get(name) == Some(&slot))
                        .then(|| (name.clone(), node.inputs.clone(), node.rule.clone()))
                })
                .collect()
        };
        for (name, inputs, rule) in copies {
            derived.bind(&name, inputs, rule);
        }
        for injection in injections {
            derived.bind(
                &injection.alias,
                Vec::new(),
                Rule::Import {
                    name: injection.name.clone(),
                    from: from.id,
                },
            );
        }
        debug!(
            "derived module {} from {} with {} injections",
            derived.id,
            self.id,
            injections.len()
        );
        derived
    }

    fn constant(&self, text: String) -> Definition {
        Definition::constant(text)
    }
}

#[derive(Clone)]
pub struct MemoryVariable {
    runtime: MemoryRuntime,
    slot: SlotId,
}

impl Variable for MemoryVariable {
    type Module = MemoryModule;

    fn define(
        &self,
        name: Option<&str>,
        inputs: &[String],
        definition: Definition,
    ) -> Result<(), RuntimeError> {
        self.runtime
            .define(self.slot, name, inputs, Rule::Define(definition))
    }

    fn import(&self, name: &str, alias: &str, from: &MemoryModule) -> Result<(), RuntimeError> {
        self.runtime.define(
            self.slot,
            Some(alias),
            &[],
            Rule::Import {
                name: name.to_owned(),
                from: from.id,
            },
        )
    }

    fn delete(&self) {
        self.runtime.delete(self.slot);
    }
}
