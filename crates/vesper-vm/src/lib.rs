//! Vesper VM
//!
//! The register/heap-addressed machine compiled programs run on. This
//! crate owns the heap model, the program symbol table, the assembler
//! that links assembly text into a [`Program`], and the registry of
//! library externs that programs (and field initializers) may call.

mod assembler;
mod error;
mod externs;
mod heap;
pub mod ops;
mod program;

pub use assembler::{assemble, HALT_ADDRESS};
pub use error::*;
pub use externs::{ExternFunction, ExternRegistry, NativeFn};
pub use heap::Heap;
pub use program::{Instruction, Program, ProgramSymbols, SyncMode};
