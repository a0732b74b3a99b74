//! Statement AST nodes

use serde::{Deserialize, Serialize};

use crate::{Expr, Span, TypeRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Local declaration: `int n = 3;`
    Local {
        ty: TypeRef,
        name: String,
        init: Option<Expr>,
    },

    /// Assignment: `label = "open";`
    Assign { target: Expr, value: Expr },

    /// Expression statement: `other.open();`
    Expr(Expr),

    /// `return;`
    Return,
}
