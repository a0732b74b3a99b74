//! Error types for binding and type resolution

use thiserror::Error;
use vesper_ast::{Span, ValueType};
use vesper_parser::ParseError;

/// Symbol table misuse
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SymbolError {
    #[error("'{name}' is already declared in this scope")]
    Duplicate { name: String },

    #[error("close_scope called with no open scope")]
    Unbalanced,
}

/// Errors from binding one module
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// E-BIND-001
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// E-BIND-002
    #[error("the name '{name}' does not exist in the current context")]
    Undeclared { name: String, span: Span },

    /// E-BIND-003
    #[error("'{name}' is already declared")]
    Duplicate { name: String, span: Span },

    /// E-BIND-004
    #[error("unknown namespace '{name}'")]
    UnknownNamespace { name: String, span: Span },

    /// E-BIND-005
    #[error("'{namespace}' does not contain a function named '{name}'")]
    UnknownFunction {
        namespace: String,
        name: String,
        span: Span,
    },

    /// E-BIND-006
    #[error("unknown attribute '{name}'")]
    UnknownAttribute { name: String, span: Span },

    /// E-BIND-007
    #[error("invalid sync mode '{mode}'")]
    InvalidSyncMode { mode: String, span: Span },

    /// E-BIND-008
    #[error("const field '{name}' requires an initializer")]
    ConstWithoutInitializer { name: String, span: Span },

    /// E-BIND-009
    #[error("cannot assign a {found} literal to '{name}' of type {expected}")]
    LiteralTypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
        span: Span,
    },

    /// E-BIND-010
    #[error("the left-hand side of an assignment must be a variable, field or element")]
    InvalidAssignmentTarget { span: Span },

    /// E-BIND-011
    #[error("'{name}' is constant and cannot be assigned")]
    AssignToConst { name: String, span: Span },

    /// E-BIND-012
    #[error("only calls can be used as statements")]
    NotAStatement { span: Span },

    /// E-BIND-013
    #[error("{what} is not supported")]
    Unsupported { what: String, span: Span },

    /// E-BIND-014
    #[error("'{name}' uses the reserved prefix '__'")]
    ReservedName { name: String, span: Span },

    /// E-BIND-999
    #[error("internal binder error: {message}")]
    Internal { message: String, span: Span },
}

impl BindError {
    pub fn span(&self) -> Span {
        match self {
            BindError::Parse(e) => e.span(),
            BindError::Undeclared { span, .. } => *span,
            BindError::Duplicate { span, .. } => *span,
            BindError::UnknownNamespace { span, .. } => *span,
            BindError::UnknownFunction { span, .. } => *span,
            BindError::UnknownAttribute { span, .. } => *span,
            BindError::InvalidSyncMode { span, .. } => *span,
            BindError::ConstWithoutInitializer { span, .. } => *span,
            BindError::LiteralTypeMismatch { span, .. } => *span,
            BindError::InvalidAssignmentTarget { span } => *span,
            BindError::AssignToConst { span, .. } => *span,
            BindError::NotAStatement { span } => *span,
            BindError::Unsupported { span, .. } => *span,
            BindError::ReservedName { span, .. } => *span,
            BindError::Internal { span, .. } => *span,
        }
    }

    /// Error code for machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            BindError::Parse(e) => e.code(),
            BindError::Undeclared { .. } => "E-BIND-002",
            BindError::Duplicate { .. } => "E-BIND-003",
            BindError::UnknownNamespace { .. } => "E-BIND-004",
            BindError::UnknownFunction { .. } => "E-BIND-005",
            BindError::UnknownAttribute { .. } => "E-BIND-006",
            BindError::InvalidSyncMode { .. } => "E-BIND-007",
            BindError::ConstWithoutInitializer { .. } => "E-BIND-008",
            BindError::LiteralTypeMismatch { .. } => "E-BIND-009",
            BindError::InvalidAssignmentTarget { .. } => "E-BIND-010",
            BindError::AssignToConst { .. } => "E-BIND-011",
            BindError::NotAStatement { .. } => "E-BIND-012",
            BindError::Unsupported { .. } => "E-BIND-013",
            BindError::ReservedName { .. } => "E-BIND-014",
            BindError::Internal { .. } => "E-BIND-999",
        }
    }
}

/// Errors from typing bound expressions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    /// E-TYPE-001
    #[error("cannot convert {found} to {expected}")]
    Mismatch {
        expected: ValueType,
        found: ValueType,
        span: Span,
    },

    /// E-TYPE-002
    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    InvalidOperands {
        op: &'static str,
        left: ValueType,
        right: ValueType,
        span: Span,
    },

    /// E-TYPE-003
    #[error("operator '{op}' cannot be applied to {operand}")]
    InvalidOperand {
        op: &'static str,
        operand: ValueType,
        span: Span,
    },

    /// E-TYPE-004
    #[error("no overload of '{name}' takes arguments ({args})")]
    NoOverload {
        name: String,
        args: String,
        span: Span,
    },

    /// E-TYPE-005
    #[error("the type or behaviour '{name}' could not be found")]
    UnknownType { name: String, span: Span },

    /// E-TYPE-006
    #[error("'{owner}' does not contain a public member '{name}'")]
    UnknownMember {
        owner: String,
        name: String,
        span: Span,
    },

    /// E-TYPE-007
    #[error("cannot index into {ty}")]
    NotIndexable { ty: ValueType, span: Span },

    /// E-TYPE-008
    #[error("expression does not produce a value")]
    NoValue { span: Span },

    /// E-TYPE-009
    #[error("method '{name}' takes no arguments")]
    Arity { name: String, span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::Mismatch { span, .. } => *span,
            TypeError::InvalidOperands { span, .. } => *span,
            TypeError::InvalidOperand { span, .. } => *span,
            TypeError::NoOverload { span, .. } => *span,
            TypeError::UnknownType { span, .. } => *span,
            TypeError::UnknownMember { span, .. } => *span,
            TypeError::NotIndexable { span, .. } => *span,
            TypeError::NoValue { span } => *span,
            TypeError::Arity { span, .. } => *span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TypeError::Mismatch { .. } => "E-TYPE-001",
            TypeError::InvalidOperands { .. } => "E-TYPE-002",
            TypeError::InvalidOperand { .. } => "E-TYPE-003",
            TypeError::NoOverload { .. } => "E-TYPE-004",
            TypeError::UnknownType { .. } => "E-TYPE-005",
            TypeError::UnknownMember { .. } => "E-TYPE-006",
            TypeError::NotIndexable { .. } => "E-TYPE-007",
            TypeError::NoValue { .. } => "E-TYPE-008",
            TypeError::Arity { .. } => "E-TYPE-009",
        }
    }
}
