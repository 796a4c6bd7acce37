use anyhow::{Context, Result, bail};
use ariadne::{Label, Report, ReportKind, Source};
use cellflow::compiler::{Loader, NotebookResolver, expand_notebook_url, format_import};
use cellflow::parser::ParsedCell;
use cellflow::runtime::{Intrinsics, MemoryModule, MemoryRuntime, Opaque};
use cellflow::{
    CellDescriptor, CodeTreeBuilder, CompileOptions, Config, GraphCompiler, Notebook, parse_cell,
    visit_notebook,
};
use clap::{Parser as ClapParser, Subcommand};
use futures_util::future::LocalBoxFuture;
use log::{LevelFilter, debug, info};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(ClapParser)]
#[command(name = "cellflow")]
#[command(about = "Compile notebook cells into dataflow graphs")]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn parsed cells into a notebook descriptor tree
    Tree {
        /// JSON array of parsed cells (`{ input, cell }`)
        file: PathBuf,
    },
    /// Print the module URL each import source expands to
    Resolve {
        sources: Vec<String>,
    },
    /// Compile a notebook into the in-memory runtime and print its nodes
    Graph {
        /// Notebook descriptor JSON
        notebook: PathBuf,
        /// Directory holding imported notebooks as `<id>.json`
        #[arg(long)]
        library: Option<PathBuf>,
    },
    /// Print the import statements of a notebook
    Imports {
        notebook: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Tree { file } => tree(&file)?,
        Commands::Resolve { sources } => {
            for source in sources {
                println!("{}", expand_notebook_url(&source, &config.resolver));
            }
        }
        Commands::Graph { notebook, library } => graph(&notebook, library, config).await?,
        Commands::Imports { notebook } => {
            for cell in read_notebook(&notebook)?.cells {
                if let CellDescriptor::Import(import) = cell {
                    println!("{}", format_import(&import));
                }
            }
        }
    }
    Ok(())
}

fn tree(file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let cells: Vec<ParsedCell> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a list of parsed cells", file.display()))?;

    let mut builder = CodeTreeBuilder::new();
    for (index, parsed) in cells.iter().enumerate() {
        if let Err(error) = parse_cell(parsed, &mut builder) {
            let filename = format!("{}#{index}", file.display());
            bail!("{}", report(&error, &filename, &parsed.input));
        }
    }
    println!("{}", builder.into_notebook().to_json()?);
    Ok(())
}

/// Renders a cell error against the cell's source, like a parse error.
fn report(error: &cellflow::Error, filename: &str, input: &str) -> String {
    let range = error.span().map_or(0..0, |span| span.into_range());
    let mut bytes = Vec::new();
    let written = Report::build(ReportKind::Error, (filename, range.clone()))
        .with_config(ariadne::Config::default().with_color(false))
        .with_message(error.to_string())
        .with_label(Label::new((filename, range)).with_message("while reading this node"))
        .finish()
        .write((filename, Source::from(input)), &mut bytes);
    match written {
        Ok(()) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => error.to_string(),
    }
}

fn read_notebook(path: &Path) -> Result<Notebook> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Notebook::from_json(&text).with_context(|| format!("{} is not a notebook", path.display()))
}

async fn graph(path: &Path, library: Option<PathBuf>, config: Config) -> Result<()> {
    let notebook = read_notebook(path)?;
    let runtime = MemoryRuntime::with_config(config.runtime.clone());
    let dir = library.unwrap_or_else(|| path.parent().map(Path::to_path_buf).unwrap_or_default());
    let loader = LibraryLoader::new(dir, config);
    let module = loader.compile(&notebook, runtime).await?;
    println!("{}", serde_json::to_string_pretty(&module.variables())?);
    Ok(())
}

/// Loads imported notebooks from `<dir>/<id>.json`.
///
/// Each URL compiles once per run. A URL requested again while its own
/// imports are still resolving is an import cycle.
#[derive(Clone)]
struct LibraryLoader {
    dir: PathBuf,
    config: Config,
    loading: Rc<RefCell<HashSet<String>>>,
    loaded: Rc<RefCell<HashMap<String, MemoryModule>>>,
}

impl LibraryLoader {
    fn new(dir: PathBuf, config: Config) -> Self {
        Self {
            dir,
            config,
            loading: Rc::default(),
            loaded: Rc::default(),
        }
    }

    async fn compile(&self, notebook: &Notebook, runtime: MemoryRuntime) -> cellflow::Result<MemoryModule> {
        let mut compiler = GraphCompiler::new(
            runtime,
            CompileOptions::<MemoryModule, _>::new(Intrinsics::new(Opaque)),
        );
        visit_notebook(notebook, &mut compiler)?;
        let resolver = NotebookResolver::with_config(self.clone(), self.config.resolver.clone());
        compiler.finalize(&resolver).await
    }

    async fn read(&self, url: &str, runtime: MemoryRuntime) -> cellflow::Result<MemoryModule> {
        let path = self.notebook_path(url)?;
        info!("loading {url} from {}", path.display());
        let text = fs::read_to_string(&path).map_err(|error| cellflow::Error::resolve(url, error))?;
        let notebook = Notebook::from_json(&text)?;
        self.compile(&notebook, runtime).await
    }

    fn notebook_path(&self, url: &str) -> cellflow::Result<PathBuf> {
        let origin = self.config.resolver.api_origin.trim_end_matches('/');
        let id = url
            .strip_prefix(origin)
            .map(|rest| rest.trim_start_matches('/'))
            .and_then(|rest| rest.split_once(".js").map(|(id, _)| id))
            .ok_or_else(|| cellflow::Error::resolve(url, "not a hosted notebook module"))?;
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl Loader<MemoryRuntime> for LibraryLoader {
    #[allow(refining_impl_trait)]
    fn load(&self, url: &str, runtime: &MemoryRuntime) -> LocalBoxFuture<'_, cellflow::Result<MemoryModule>> {
        let url = url.to_owned();
        let runtime = runtime.clone();
        Box::pin(async move {
            let cached = self.loaded.borrow().get(&url).cloned();
            if let Some(module) = cached {
                debug!("reusing {url}");
                return Ok(module);
            }
            if !self.loading.borrow_mut().insert(url.clone()) {
                return Err(cellflow::Error::resolve(&url, "import cycle"));
            }
            let result = self.read(&url, runtime).await;
            self.loading.borrow_mut().remove(&url);
            let module = result?;
            self.loaded.borrow_mut().insert(url, module.clone());
            Ok(module)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library(name: &str, notebooks: &[(&str, serde_json::Value)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cellflow-{name}-{}", std::process::id()));
        for (id, notebook) in notebooks {
            let path = dir.join(format!("{id}.json"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, notebook.to_string()).unwrap();
        }
        dir
    }

    fn importing(source: &str) -> serde_json::Value {
        json!({ "type": "import", "source": source, "specifiers": [{ "name": "x", "alias": "x" }] })
    }

    #[tokio::test]
    async fn self_import_is_an_import_cycle() {
        let dir = library("cycle", &[("@o/self", json!({ "cells": [importing("@o/self")] }))]);
        let notebook = Notebook::from_json(&json!({ "cells": [importing("@o/self")] }).to_string()).unwrap();

        let loader = LibraryLoader::new(dir, Config::default());
        let Err(error) = loader.compile(&notebook, MemoryRuntime::new()).await else {
            panic!("a notebook importing itself should not compile");
        };
        assert!(matches!(error, cellflow::Error::Resolve { ref reason, .. } if reason == "import cycle"));
        assert!(loader.loading.borrow().is_empty());
    }

    #[tokio::test]
    async fn repeated_imports_share_one_load() {
        let dir = library("shared", &[("@o/lib", json!({ "cells": [] }))]);
        let notebook = Notebook::from_json(
            &json!({ "cells": [importing("@o/lib"), importing("@o/lib")] }).to_string(),
        )
        .unwrap();

        let loader = LibraryLoader::new(dir, Config::default());
        loader.compile(&notebook, MemoryRuntime::new()).await.unwrap();
        assert_eq!(loader.loaded.borrow().len(), 1);
    }
}
