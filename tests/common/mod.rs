//! Shared fixtures for the end-to-end build tests

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use vesper_ast::{ScriptRef, Value};
use vesper_build::{BuildConfig, Builder, CompileError, ProgramRegistry, VmProgramAsset};
use vesper_vm::{ExternRegistry, Program};

pub fn externs() -> Arc<ExternRegistry> {
    Arc::new(ExternRegistry::standard())
}

/// Registry holding one inline asset per `(path, source)`
pub fn registry(sources: &[(&str, &str)]) -> ProgramRegistry {
    let externs = externs();
    let mut registry = ProgramRegistry::new(externs.clone());
    for (path, source) in sources {
        registry.register(Box::new(VmProgramAsset::inline(*path, *source, externs.clone())));
    }
    registry
}

pub fn sequential_builder() -> Builder {
    Builder::new(BuildConfig::default().sequential(), externs()).expect("Failed to create builder")
}

pub fn concurrent_builder() -> Builder {
    let config = BuildConfig {
        max_workers: Some(4),
        ..BuildConfig::default()
    };
    Builder::new(config, externs()).expect("Failed to create builder")
}

/// Staged program of `path`, whether or not it was committed
pub fn staged(registry: &ProgramRegistry, path: &str) -> Option<Program> {
    registry
        .lookup_by_path(&ScriptRef::from(path))
        .and_then(|asset| asset.program())
        .cloned()
}

pub fn live(registry: &ProgramRegistry, path: &str) -> Option<Program> {
    registry
        .lookup_by_path(&ScriptRef::from(path))
        .and_then(|asset| asset.live_program())
        .cloned()
}

/// Value of heap variable `name` in the committed program of `path`
pub fn live_value(registry: &ProgramRegistry, path: &str, name: &str) -> Option<Value> {
    live(registry, path).and_then(|program| program.get_variable(name).cloned())
}

pub fn error_set(errors: &[CompileError]) -> BTreeSet<CompileError> {
    errors.iter().cloned().collect()
}
