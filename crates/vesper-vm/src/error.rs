//! Error types for the machine model

use thiserror::Error;
use vesper_ast::ValueType;

/// Link/verify failures while assembling program text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssembleError {
    #[error("line {line}: expected section {expected}")]
    MissingSection { line: usize, expected: &'static str },

    #[error("line {line}: unknown directive '{directive}'")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: malformed data declaration")]
    MalformedData { line: usize },

    #[error("line {line}: unknown type '{name}'")]
    UnknownType { line: usize, name: String },

    #[error("line {line}: duplicate symbol '{name}'")]
    DuplicateSymbol { line: usize, name: String },

    #[error("program declares {declared} symbols but {expected} were expected")]
    SymbolCountMismatch { declared: usize, expected: usize },

    #[error("line {line}: unknown opcode '{opcode}'")]
    UnknownOpcode { line: usize, opcode: String },

    #[error("line {line}: opcode {opcode} requires an operand")]
    MissingOperand { line: usize, opcode: &'static str },

    #[error("line {line}: unknown symbol '{name}'")]
    UnknownSymbol { line: usize, name: String },

    #[error("line {line}: unknown extern '{name}'")]
    UnknownExtern { line: usize, name: String },

    #[error("line {line}: unknown label '{name}'")]
    UnknownLabel { line: usize, name: String },

    #[error("export '{name}' does not name a symbol or label")]
    UnknownExport { name: String },

    #[error("unknown sync mode '{mode}' for '{name}'")]
    UnknownSyncMode { name: String, mode: String },
}

impl AssembleError {
    pub fn code(&self) -> &'static str {
        match self {
            AssembleError::MissingSection { .. } => "E-ASM-001",
            AssembleError::UnknownDirective { .. } => "E-ASM-002",
            AssembleError::MalformedData { .. } => "E-ASM-003",
            AssembleError::UnknownType { .. } => "E-ASM-004",
            AssembleError::DuplicateSymbol { .. } => "E-ASM-005",
            AssembleError::SymbolCountMismatch { .. } => "E-ASM-006",
            AssembleError::UnknownOpcode { .. } => "E-ASM-007",
            AssembleError::MissingOperand { .. } => "E-ASM-008",
            AssembleError::UnknownSymbol { .. } => "E-ASM-009",
            AssembleError::UnknownExtern { .. } => "E-ASM-010",
            AssembleError::UnknownLabel { .. } => "E-ASM-011",
            AssembleError::UnknownExport { .. } => "E-ASM-012",
            AssembleError::UnknownSyncMode { .. } => "E-ASM-013",
        }
    }
}

/// Heap access failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HeapError {
    #[error("heap address {address} out of range (heap size {size})")]
    AddressOutOfRange { address: u32, size: usize },

    #[error("cannot store {found} in a slot of type {expected}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("no symbol named '{0}'")]
    UnknownSymbol(String),
}

/// Failures raised by extern and operator implementations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExternError {
    #[error("attempted to divide by zero")]
    DivideByZero,

    #[error("arithmetic operation overflowed")]
    Overflow,

    #[error("index {index} is out of range for length {length}")]
    IndexOutOfRange { index: i64, length: usize },

    #[error("negative array size {0}")]
    NegativeSize(i64),

    #[error("array size {size} exceeds the limit of {limit} elements")]
    ArrayTooLarge { size: i64, limit: usize },

    #[error("null reference")]
    NullReference,

    #[error("invalid arguments to {0}")]
    InvalidArguments(String),
}
