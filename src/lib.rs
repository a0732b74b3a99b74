//! Vesper - build pipeline for a heap-addressed program VM
//!
//! This is the root workspace crate that provides integration tests.
//! The actual implementation is in the workspace member crates.

// Re-export main crates for convenience
pub use vesper_ast as ast;
pub use vesper_build as build;
pub use vesper_codegen as codegen;
pub use vesper_symbols as symbols;
pub use vesper_vm as vm;
