//! Vesper AST - Core types shared by every compiler stage
//!
//! This crate defines spans and line positions, script references,
//! the preprocessor define header, value types, heap values and the
//! syntax tree produced by the parser.

mod span;
mod source;
mod types;
mod value;
mod expr;
mod stmt;
mod decl;

pub use span::*;
pub use source::*;
pub use types::*;
pub use value::*;
pub use expr::*;
pub use stmt::*;
pub use decl::*;
