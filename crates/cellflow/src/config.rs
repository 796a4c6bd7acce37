//! Settings shared by the resolver and the reference runtime.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! [resolver]
//! api_origin = "https://api.observablehq.com"
//! version = "3"
//!
//! [runtime]
//! max_passes = 64
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Where hosted notebook shorthands (`@owner/name`, `d/<id>`) expand to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub api_origin: String,
    pub version: String,
}

impl ResolverConfig {
    pub fn module_url(&self, id: &str) -> String {
        format!(
            "{}/{}.js?v={}",
            self.api_origin.trim_end_matches('/'),
            id,
            self.version
        )
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_origin: "https://api.observablehq.com".to_owned(),
            version: "3".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on re-evaluation passes before the reference runtime
    /// reports that the graph does not settle.
    pub max_passes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_passes: 64 }
    }
}
