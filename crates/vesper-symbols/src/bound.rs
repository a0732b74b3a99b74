//! Name-resolved method bodies and initializer expressions

use vesper_ast::{BinaryOp, Span, UnaryOp, Value, ValueType, Visibility};

use crate::SymbolId;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpr {
    pub kind: BoundExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExprKind {
    Literal(Value),
    /// Field, local or constant of the enclosing class
    Symbol(SymbolId),
    /// Library function, overload not yet chosen
    Extern {
        namespace: String,
        name: String,
        args: Vec<BoundExpr>,
    },
    /// Method call on another behaviour: `other.open()`
    MethodCall {
        object: Box<BoundExpr>,
        method: String,
        args: Vec<BoundExpr>,
    },
    /// Field of another behaviour, or `.length`
    Member { object: Box<BoundExpr>, name: String },
    Index {
        object: Box<BoundExpr>,
        index: Box<BoundExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Unary { op: UnaryOp, operand: Box<BoundExpr> },
    NewArray {
        /// Type of the created array
        ty: ValueType,
        size: Option<Box<BoundExpr>>,
        items: Option<Vec<BoundExpr>>,
    },
    NewObject { ty: ValueType },
    /// Call on a host-provided object such as `program.store(..)`
    Intrinsic {
        target: String,
        name: String,
        args: Vec<BoundExpr>,
    },
}

impl BoundExpr {
    pub fn new(kind: BoundExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundStmt {
    pub kind: BoundStmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundStmtKind {
    Local {
        symbol: SymbolId,
        init: Option<BoundExpr>,
    },
    Assign { target: BoundExpr, value: BoundExpr },
    Expr(BoundExpr),
    Return,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundMethod {
    pub name: String,
    pub visibility: Visibility,
    pub body: Vec<BoundStmt>,
    pub span: Span,
}

impl BoundMethod {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}
