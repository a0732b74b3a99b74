//! vesper-symbols: symbols, class definitions and the module binder
//!
//! - [`SymbolTable`]: scoped, explicitly opened/closed, produces unique
//!   heap names
//! - [`ClassDefinition`]: one bound module with its fields, bound method
//!   bodies and import context
//! - [`Binder`]: the reference module binder
//! - [`TypeEnv`]: static typing of bound expressions, shared by the code
//!   generator and the initializer evaluator
//!
//! # Example
//!
//! ```ignore
//! use vesper_symbols::bind_module;
//! use vesper_vm::ExternRegistry;
//!
//! let class = bind_module(&"Door.vsp".into(), "behaviour Door { public int n = 2; }", &ExternRegistry::standard()).unwrap();
//! assert_eq!(class.name, "Door");
//! ```

mod binder;
mod bound;
mod class;
mod error;
mod table;
mod typing;

pub use binder::{bind_module, Binder, NodeTracker, RESERVED_PREFIX};
pub use bound::*;
pub use class::*;
pub use error::{BindError, SymbolError, TypeError};
pub use table::{DeclFlags, SymbolDefinition, SymbolId, SymbolTable};
pub use typing::TypeEnv;
