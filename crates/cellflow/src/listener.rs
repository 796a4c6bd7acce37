//! Receivers for cell descriptors.

use crate::descriptor::{CellDefinition, CellDescriptor, ImportDefinition};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Receives descriptors in cell order.
pub trait Listener {
    fn on_cell(&mut self, cell: CellDefinition) -> Result<()>;
    fn on_import(&mut self, import: ImportDefinition) -> Result<()>;
}

impl<L: Listener + ?Sized> Listener for &mut L {
    fn on_cell(&mut self, cell: CellDefinition) -> Result<()> {
        (**self).on_cell(cell)
    }

    fn on_import(&mut self, import: ImportDefinition) -> Result<()> {
        (**self).on_import(import)
    }
}

/// Serializable record of a compiled notebook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub cells: Vec<CellDescriptor>,
}

impl Notebook {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collects descriptors into a [`Notebook`].
#[derive(Debug, Clone, Default)]
pub struct CodeTreeBuilder {
    notebook: Notebook,
}

impl CodeTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from `meta`, which is carried through untouched.
    pub fn with_meta(meta: Map<String, Value>) -> Self {
        Self {
            notebook: Notebook {
                meta,
                cells: Vec::new(),
            },
        }
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn into_notebook(self) -> Notebook {
        self.notebook
    }
}

impl Listener for CodeTreeBuilder {
    fn on_cell(&mut self, cell: CellDefinition) -> Result<()> {
        self.notebook.cells.push(cell.into());
        Ok(())
    }

    fn on_import(&mut self, import: ImportDefinition) -> Result<()> {
        self.notebook.cells.push(import.into());
        Ok(())
    }
}

/// Replays a stored notebook into `listener`.
pub fn visit_notebook(notebook: &Notebook, listener: &mut (impl Listener + ?Sized)) -> Result<()> {
    for cell in &notebook.cells {
        match cell {
            CellDescriptor::Cell(cell) => listener.on_cell(cell.clone())?,
            CellDescriptor::Import(import) => listener.on_import(import.clone())?,
        }
    }
    Ok(())
}
