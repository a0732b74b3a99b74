//! vesper-build: build orchestration for Vesper programs
//!
//! A build takes every module of a [`ProgramRegistry`] through:
//!
//! - bind: every module concurrently, all-or-nothing
//! - compile: generate and assemble every module concurrently, failures
//!   kept per module
//! - heap defaults: literal defaults and public zero values
//! - field initializers: non-literal defaults computed by one batch of
//!   auxiliary units run against each module's heap
//! - finalize, or rollback of every fingerprint on any error
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vesper_build::{BuildConfig, Builder, ProgramRegistry};
//! use vesper_vm::ExternRegistry;
//!
//! let externs = Arc::new(ExternRegistry::standard());
//! let mut registry = ProgramRegistry::discover("project", "vsp", externs.clone());
//! let mut builder = Builder::new(BuildConfig::default(), externs)?;
//! let report = builder.build(&mut registry)?;
//! if !report.is_success() {
//!     eprint!("{}", report.render(&registry));
//! }
//! ```

mod asset;
mod bind;
mod build;
mod cache;
mod compile;
mod config;
mod diagnostic;
mod error;
mod fingerprint;
pub mod heap;
pub mod initializer;
mod module;
mod pool;
mod registry;

pub use asset::{ProgramAsset, VmProgramAsset};
pub use bind::{ModuleBinder, SourceBinder};
pub use build::{BuildOutcome, BuildReport, BuildState, Builder, PostBuildHook};
pub use cache::BuildCache;
pub use compile::{AssemblyGenerator, ModuleGenerator};
pub use config::{BuildConfig, BuildType, ExecutionMode};
pub use diagnostic::{render_diagnostic, CompileError, ErrorKind};
pub use error::{BuildError, Result};
pub use fingerprint::{content_hash, Fingerprint, FingerprintStore, InMemoryFingerprints, RedbFingerprints};
pub use initializer::{
    FieldInitializerEvaluator, HeapBridge, InitializerBackend, InitializerUnit, InterpretedBackend, StoreRoute,
};
pub use module::{ClassSet, Module};
pub use pool::{Completed, Completions, Job, WorkerPanic, WorkerPool};
pub use registry::{AssetId, ProgramRegistry};
