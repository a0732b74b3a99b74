//! Expression AST nodes

use serde::{Deserialize, Serialize};

use crate::{Span, TypeRef, Value};

/// An expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Literal value: `42`, `2.5`, `"hi"`, `true`, `null`
    Literal(Literal),

    /// Identifier: `speed`
    Ident(String),

    /// Member access: `other.count`, `Math.max`
    Member { object: Box<Expr>, name: String },

    /// Call: `max(a, b)`, `other.open()`
    Call { callee: Box<Expr>, args: Vec<Expr> },

    /// Index access: `ids[0]`
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Binary operation: `a + b`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation: `-x`, `!flag`
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Array creation: `new int[3]`, `new int[] { 1, 2 }`, `new int[2][]`
    NewArray {
        ty: TypeRef,
        size: Option<Box<Expr>>,
        items: Option<Vec<Expr>>,
    },

    /// Object creation: `new Door()`
    NewObject { ty: TypeRef },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::Str(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Name of the extern implementing the operator
    pub fn extern_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "op_Addition",
            BinaryOp::Sub => "op_Subtraction",
            BinaryOp::Mul => "op_Multiply",
            BinaryOp::Div => "op_Division",
            BinaryOp::Rem => "op_Remainder",
            BinaryOp::Eq => "op_Equality",
            BinaryOp::NotEq => "op_Inequality",
            BinaryOp::Lt => "op_LessThan",
            BinaryOp::LtEq => "op_LessThanOrEqual",
            BinaryOp::Gt => "op_GreaterThan",
            BinaryOp::GtEq => "op_GreaterThanOrEqual",
            BinaryOp::And => "op_ConditionalAnd",
            BinaryOp::Or => "op_ConditionalOr",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn extern_name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "op_UnaryMinus",
            UnaryOp::Not => "op_UnaryNegation",
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Value of a compile-time literal: a literal, or a negated numeric literal
    pub fn literal_value(&self) -> Option<Value> {
        match &self.kind {
            ExprKind::Literal(lit) => Some(lit.to_value()),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match &operand.kind {
                ExprKind::Literal(Literal::Int(n)) => Some(Value::Int(n.wrapping_neg())),
                ExprKind::Literal(Literal::Float(f)) => Some(Value::Float(-f)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Dotted path for `a.b.c` chains of identifiers
    pub fn as_path(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name.clone()),
            ExprKind::Member { object, name } => {
                object.as_path().map(|prefix| format!("{}.{}", prefix, name))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(l: Literal) -> Box<Expr> {
        Box::new(Expr::new(ExprKind::Literal(l), Span::dummy()))
    }

    #[test]
    fn test_negated_literal_is_literal() {
        let expr = Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: lit(Literal::Float(1.5)),
            },
            Span::dummy(),
        );
        assert_eq!(expr.literal_value(), Some(Value::Float(-1.5)));
    }

    #[test]
    fn test_binary_is_not_literal() {
        let expr = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: lit(Literal::Int(1)),
                right: lit(Literal::Int(2)),
            },
            Span::dummy(),
        );
        assert_eq!(expr.literal_value(), None);
    }

    #[test]
    fn test_member_path() {
        let expr = Expr::new(
            ExprKind::Member {
                object: Box::new(Expr::new(ExprKind::Ident("Math".into()), Span::dummy())),
                name: "max".into(),
            },
            Span::dummy(),
        );
        assert_eq!(expr.as_path().as_deref(), Some("Math.max"));
    }
}
