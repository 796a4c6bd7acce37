//! Import resolution: turning an import source into a runtime module.

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::runtime::{Module, Runtime};
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

static FRAGMENT: LazyLock<Regex> = LazyLock::new(|| compile_pattern(r"(?m)#.*$"));
static QUERY: LazyLock<Regex> = LazyLock::new(|| compile_pattern(r"(?m)\?.*$"));
static HOSTED: LazyLock<Regex> =
    LazyLock::new(|| compile_pattern(r"(?i)^https://observablehq\.com/"));
static API: LazyLock<Regex> =
    LazyLock::new(|| compile_pattern(r"(?i)^https://(api\.|beta\.|)observablehq\.com/"));
static SCRIPT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| compile_pattern(r"(?i)\.js$"));
static OWNER_SLUG: LazyLock<Regex> = LazyLock::new(|| compile_pattern(r"(?i)^@\S+/\S+$"));
static DOCUMENT_ID: LazyLock<Regex> = LazyLock::new(|| compile_pattern(r"(?i)^d/[0-9a-z]+$"));

fn compile_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern")
}

/// Expands hosted notebook shorthands to their module URL.
///
/// Other sources come back unchanged.
pub fn expand_notebook_url(source: &str, config: &ResolverConfig) -> String {
    let name = FRAGMENT.replace_all(source, "");
    let name = QUERY.replace_all(&name, "").into_owned();
    let name = if let Some(found) = HOSTED.find(&name) {
        name[found.end()..].to_owned()
    } else if let Some(found) = API.find(&name) {
        SCRIPT_SUFFIX.replace(&name[found.end()..], "").into_owned()
    } else {
        name
    };
    if OWNER_SLUG.is_match(&name) || DOCUMENT_ID.is_match(&name) {
        config.module_url(&name)
    } else {
        source.to_owned()
    }
}

/// What the graph compiler hands a resolver for one import.
pub struct ImportRequest<'a, R: Runtime> {
    pub source: &'a str,
    pub runtime: &'a R,
    /// The module the import lands in.
    pub module: &'a R::Module,
    pub observer: &'a dyn Fn(Option<&str>) -> Option<<R::Module as Module>::Observer>,
}

pub trait Resolver<R: Runtime> {
    fn resolve(&self, request: ImportRequest<'_, R>) -> impl Future<Output = Result<R::Module>>;
}

impl<R: Runtime, T: Resolver<R> + ?Sized> Resolver<R> for &T {
    fn resolve(&self, request: ImportRequest<'_, R>) -> impl Future<Output = Result<R::Module>> {
        (**self).resolve(request)
    }
}

/// Resolver for batches without imports; any import fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImports;

impl<R: Runtime> Resolver<R> for NoImports {
    async fn resolve(&self, request: ImportRequest<'_, R>) -> Result<R::Module> {
        Err(Error::resolve(request.source, "imports are not supported here"))
    }
}

/// Loads the module behind an expanded URL.
pub trait Loader<R: Runtime> {
    fn load(&self, url: &str, runtime: &R) -> impl Future<Output = Result<R::Module>>;
}

/// Expands hosted notebook shorthands, then delegates to a [`Loader`].
#[derive(Debug, Clone)]
pub struct NotebookResolver<L> {
    loader: L,
    config: ResolverConfig,
}

impl<L> NotebookResolver<L> {
    pub fn new(loader: L) -> Self {
        Self::with_config(loader, ResolverConfig::default())
    }

    pub fn with_config(loader: L, config: ResolverConfig) -> Self {
        Self { loader, config }
    }
}

impl<R: Runtime, L: Loader<R>> Resolver<R> for NotebookResolver<L> {
    async fn resolve(&self, request: ImportRequest<'_, R>) -> Result<R::Module> {
        let url = expand_notebook_url(request.source, &self.config);
        debug!("loading `{}` from {url}", request.source);
        self.loader.load(&url, request.runtime).await
    }
}
