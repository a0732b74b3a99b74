//! Build configuration

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vesper_ast::DefineHeader;

use crate::Result;

/// Which flavor of program a build produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    #[default]
    Editor,
    Client,
}

impl BuildType {
    /// Preprocessor symbol defined for this build type
    pub fn define(self) -> &'static str {
        match self {
            BuildType::Editor => "EDITOR",
            BuildType::Client => "CLIENT",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildType::Editor => write!(f, "editor"),
            BuildType::Client => write!(f, "client"),
        }
    }
}

/// How worker thunks are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Thread pool, results drained in completion order
    #[default]
    Concurrent,
    /// Calling thread only, last submitted first
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub build_type: BuildType,
    pub execution: ExecutionMode,
    /// Worker threads; the number of CPUs when unset
    pub max_workers: Option<usize>,
    /// Extra preprocessor symbols
    pub defines: Vec<String>,
    /// Extension of module source files, without the dot
    pub source_extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_type: BuildType::Editor,
            execution: ExecutionMode::Concurrent,
            max_workers: None,
            defines: Vec::new(),
            source_extension: "vsp".to_string(),
        }
    }
}

impl BuildConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn sequential(mut self) -> Self {
        self.execution = ExecutionMode::Sequential;
        self
    }

    pub fn with_build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Define header prepended to every module before binding
    pub fn define_header(&self) -> DefineHeader {
        DefineHeader::new(
            std::iter::once(self.build_type.define().to_string()).chain(self.defines.iter().cloned()),
        )
    }
}
