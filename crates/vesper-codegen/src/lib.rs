//! Vesper Codegen - VM assembly generation
//!
//! Lowers one bound class to assembly text. Member accesses on
//! behaviour-typed values are resolved against the full set of bound
//! classes, so every module of a build must be bound before any is
//! generated.

mod emitter;

pub use emitter::Emitter;

use thiserror::Error;
use vesper_ast::{Span, ValueType};
use vesper_symbols::{ClassDefinition, ClassLookup, SymbolTable, TypeError};
use vesper_vm::ExternRegistry;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("behaviours cannot be created with 'new'; '{ty}' must be assigned from an existing instance")]
    ObjectCreation { ty: ValueType, span: Span },

    #[error("{what} is not supported here")]
    Unsupported { what: String, span: Span },

    #[error("internal generator error: {message}")]
    Internal { message: String, span: Span },
}

impl GenerateError {
    pub fn span(&self) -> Span {
        match self {
            GenerateError::Type(e) => e.span(),
            GenerateError::ObjectCreation { span, .. } => *span,
            GenerateError::Unsupported { span, .. } => *span,
            GenerateError::Internal { span, .. } => *span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GenerateError::Type(e) => e.code(),
            GenerateError::ObjectCreation { .. } => "E-GEN-001",
            GenerateError::Unsupported { .. } => "E-GEN-002",
            GenerateError::Internal { .. } => "E-GEN-999",
        }
    }
}

/// Output of generating one module
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    pub assembly: String,
    /// Number of data symbols the assembly declares
    pub symbol_count: usize,
    /// The class symbols plus every constant and temporary generated
    pub symbols: SymbolTable,
}

/// Generate assembly for `class`, resolving cross-module references
/// against `classes`
pub fn generate(
    class: &ClassDefinition,
    classes: &dyn ClassLookup,
    externs: &ExternRegistry,
) -> Result<GeneratedModule, Vec<GenerateError>> {
    Emitter::new(class, classes, externs).emit()
}
