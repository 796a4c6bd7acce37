//! Registers descriptors into a runtime module.
//!
//! [`GraphCompiler`] is a [`Listener`]: value cells are defined as they
//! arrive, imports are queued and wired up in declaration order by
//! [`GraphCompiler::finalize`]. Every value cell of a batch is therefore
//! registered before the first import resolves.

use crate::descriptor::{CellDefinition, CellDescriptor, ImportDefinition};
use crate::error::Result;
use crate::listener::Listener;
use crate::runtime::{CellCompiler, Module, Runtime, Variable};
use log::{debug, info};
use std::collections::VecDeque;

mod format;
pub use format::format_import;

mod resolve;
pub use resolve::{
    ImportRequest, Loader, NoImports, NotebookResolver, Resolver, expand_notebook_url,
};

/// Creates the observer for a node, given its name (`None` when anonymous).
pub type ObserverFactory<M> = Box<dyn Fn(Option<&str>) -> Option<<M as Module>::Observer>>;
pub type ImportFormatter = Box<dyn Fn(&ImportDefinition) -> String>;

type VariableOf<R> = <<R as Runtime>::Module as Module>::Variable;

/// Nodes created for one import: a node per specifier plus the proxy node
/// holding the formatted statement.
#[derive(Debug, Clone)]
pub struct ImportGroup<V> {
    pub source: String,
    pub members: Vec<V>,
    pub proxy: V,
}

/// Deletes every node of an import, the proxy last.
pub fn remove_import<V: Variable>(group: ImportGroup<V>) {
    for member in &group.members {
        member.delete();
    }
    group.proxy.delete();
}

pub struct CompileOptions<M: Module, C> {
    pub cells: C,
    /// Target module; a fresh one when absent.
    pub module: Option<M>,
    pub observer: Option<ObserverFactory<M>>,
    pub format: Option<ImportFormatter>,
}

impl<M: Module, C> CompileOptions<M, C> {
    pub fn new(cells: C) -> Self {
        Self {
            cells,
            module: None,
            observer: None,
            format: None,
        }
    }

    pub fn module(mut self, module: M) -> Self {
        self.module = Some(module);
        self
    }

    pub fn observer(mut self, observer: impl Fn(Option<&str>) -> Option<M::Observer> + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn format(mut self, format: impl Fn(&ImportDefinition) -> String + 'static) -> Self {
        self.format = Some(Box::new(format));
        self
    }
}

pub struct GraphCompiler<R: Runtime, C> {
    runtime: R,
    module: R::Module,
    cells: C,
    observer: ObserverFactory<R::Module>,
    format: ImportFormatter,
    variables: Vec<VariableOf<R>>,
    imports: Vec<ImportGroup<VariableOf<R>>>,
    pending: VecDeque<ImportDefinition>,
}

impl<R: Runtime, C: CellCompiler<R::Module>> GraphCompiler<R, C> {
    pub fn new(runtime: R, options: CompileOptions<R::Module, C>) -> Self {
        let CompileOptions {
            cells,
            module,
            observer,
            format,
        } = options;
        let module = module.unwrap_or_else(|| runtime.module());
        Self {
            runtime,
            module,
            cells,
            observer: observer.unwrap_or_else(|| Box::new(|_: Option<&str>| None)),
            format: format.unwrap_or_else(|| Box::new(format_import)),
            variables: Vec::new(),
            imports: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn module(&self) -> &R::Module {
        &self.module
    }

    /// Value nodes, in registration order.
    pub fn variables(&self) -> &[VariableOf<R>] {
        &self.variables
    }

    pub fn imports(&self) -> &[ImportGroup<VariableOf<R>>] {
        &self.imports
    }

    /// Imports not wired up yet.
    pub fn pending_imports(&self) -> impl Iterator<Item = &ImportDefinition> {
        self.pending.iter()
    }

    /// Wires up every queued import, one at a time, and returns the module.
    ///
    /// A resolver failure stops the phase: that import and the ones after it
    /// stay queued, everything registered so far stays in place.
    pub async fn finalize(&mut self, resolver: &impl Resolver<R>) -> Result<R::Module> {
        while let Some(import) = self.pending.front().cloned() {
            self.wire(&import, resolver).await?;
            self.pending.pop_front();
        }
        Ok(self.module.clone())
    }

    async fn wire(&mut self, import: &ImportDefinition, resolver: &impl Resolver<R>) -> Result<()> {
        let request = ImportRequest {
            source: &import.source,
            runtime: &self.runtime,
            module: &self.module,
            observer: &*self.observer,
        };
        let mut imported = resolver.resolve(request).await?;
        info!("resolved import from `{}`", import.source);
        if !import.injections.is_empty() {
            imported = imported.derive(&import.injections, &self.module);
        }

        let mut members = Vec::with_capacity(import.specifiers.len());
        let wired = self.wire_members(import, &imported, &mut members);
        let proxy = match wired {
            Ok(proxy) => proxy,
            Err(error) => {
                for member in &members {
                    member.delete();
                }
                return Err(error);
            }
        };

        self.imports.push(ImportGroup {
            source: import.source.clone(),
            members,
            proxy,
        });
        Ok(())
    }

    /// Creates the specifier nodes and the proxy of one import. Every node
    /// created lands in `members` so a failure can undo them.
    fn wire_members(
        &self,
        import: &ImportDefinition,
        imported: &R::Module,
        members: &mut Vec<VariableOf<R>>,
    ) -> Result<VariableOf<R>> {
        for specifier in &import.specifiers {
            let variable = self.module.variable((self.observer)(Some(&specifier.alias)));
            members.push(variable.clone());
            variable.import(&specifier.name, &specifier.alias, imported)?;
        }
        let proxy = self.module.variable((self.observer)(None));
        members.push(proxy.clone());
        proxy.define(None, &[], self.module.constant((self.format)(import)))?;
        members.pop();
        Ok(proxy)
    }

    /// Deletes the nodes of the import group at `index`.
    pub fn remove_import(&mut self, index: usize) -> Option<String> {
        if index >= self.imports.len() {
            return None;
        }
        let group = self.imports.remove(index);
        let source = group.source.clone();
        remove_import(group);
        Some(source)
    }

    pub fn into_compiled(self) -> Compiled<R::Module> {
        let mut variables = self.variables;
        variables.extend(self.imports.iter().map(|group| group.proxy.clone()));
        Compiled {
            module: self.module,
            variables,
            imports: self.imports,
        }
    }
}

impl<R: Runtime, C: CellCompiler<R::Module>> Listener for GraphCompiler<R, C> {
    fn on_cell(&mut self, cell: CellDefinition) -> Result<()> {
        let definition = self.cells.compile(&cell, &self.module)?;
        let variable = self.module.variable((self.observer)(cell.name.as_deref()));
        variable.define(cell.name.as_deref(), &cell.references, definition)?;
        debug!("defined `{}` over {:?}", cell.display_name(), cell.references);
        self.variables.push(variable);
        Ok(())
    }

    fn on_import(&mut self, import: ImportDefinition) -> Result<()> {
        debug!("queued import from `{}`", import.source);
        self.pending.push_back(import);
        Ok(())
    }
}

/// Result of a batch [`compile`].
pub struct Compiled<M: Module> {
    pub module: M,
    /// Value nodes plus one proxy per import.
    pub variables: Vec<M::Variable>,
    pub imports: Vec<ImportGroup<M::Variable>>,
}

/// Registers a batch of descriptors and wires up its imports.
pub async fn compile<R, C>(
    runtime: R,
    cells: impl IntoIterator<Item = CellDescriptor>,
    resolver: &impl Resolver<R>,
    options: CompileOptions<R::Module, C>,
) -> Result<Compiled<R::Module>>
where
    R: Runtime,
    C: CellCompiler<R::Module>,
{
    let mut compiler = GraphCompiler::new(runtime, options);
    for cell in cells {
        match cell {
            CellDescriptor::Cell(cell) => compiler.on_cell(cell)?,
            CellDescriptor::Import(import) => compiler.on_import(import)?,
        }
    }
    compiler.finalize(resolver).await?;
    Ok(compiler.into_compiled())
}
