//! Operator typing and evaluation
//!
//! Shared by the code generator (result types, extern selection) and by
//! anything that evaluates expressions directly.

use vesper_ast::{BinaryOp, UnaryOp, Value, ValueType};

use crate::ExternError;

/// Largest array a program may allocate
pub const MAX_ARRAY_LEN: usize = 1 << 24;

/// Validate a requested array length
pub fn array_len(size: i64) -> Result<usize, ExternError> {
    let len = usize::try_from(size).map_err(|_| ExternError::NegativeSize(size))?;
    if len > MAX_ARRAY_LEN {
        return Err(ExternError::ArrayTooLarge {
            size,
            limit: MAX_ARRAY_LEN,
        });
    }
    Ok(len)
}

/// Namespace whose externs implement an operator over these operand types
pub fn operator_namespace(left: &ValueType, right: &ValueType) -> &'static str {
    match (left, right) {
        (ValueType::String, _) | (_, ValueType::String) => "String",
        (ValueType::Float, r) | (r, ValueType::Float) if r.is_numeric() => "Float",
        (ValueType::Int, ValueType::Int) => "Int",
        (ValueType::Bool, ValueType::Bool) => "Bool",
        _ => "Object",
    }
}

/// Result type of `left op right`, or `None` when the operands don't support it
pub fn binary_type(op: BinaryOp, left: &ValueType, right: &ValueType) -> Option<ValueType> {
    use BinaryOp::*;

    match op {
        Add if left.is_string() || right.is_string() => {
            let printable = |t: &ValueType| !t.is_array() && !t.is_user_defined();
            (printable(left) && printable(right)).then_some(ValueType::String)
        }
        Add | Sub | Mul | Div | Rem => match (left, right) {
            (ValueType::Int, ValueType::Int) => Some(ValueType::Int),
            (l, r) if l.is_numeric() && r.is_numeric() => Some(ValueType::Float),
            _ => None,
        },
        Lt | LtEq | Gt | GtEq => {
            (left.is_numeric() && right.is_numeric()).then_some(ValueType::Bool)
        }
        Eq | NotEq => {
            let comparable = left == right
                || (left.is_numeric() && right.is_numeric())
                || (left.is_nullable() && right.is_nullable());
            comparable.then_some(ValueType::Bool)
        }
        And | Or => {
            (*left == ValueType::Bool && *right == ValueType::Bool).then_some(ValueType::Bool)
        }
    }
}

pub fn unary_type(op: UnaryOp, operand: &ValueType) -> Option<ValueType> {
    match op {
        UnaryOp::Neg if operand.is_numeric() => Some(operand.clone()),
        UnaryOp::Not if *operand == ValueType::Bool => Some(ValueType::Bool),
        _ => None,
    }
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExternError> {
    use BinaryOp::*;

    let invalid = || ExternError::InvalidArguments(op.extern_name().to_string());

    match op {
        Add if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) => {
            Ok(Value::Str(format!("{}{}", left, right)))
        }
        Add | Sub | Mul | Div | Rem => match (left, right) {
            (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
            _ => {
                let a = left.as_float().ok_or_else(invalid)?;
                let b = right.as_float().ok_or_else(invalid)?;
                Ok(Value::Float(match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    _ => a % b,
                }))
            }
        },
        Lt | LtEq | Gt | GtEq => {
            let ordering = match (left, right) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                _ => {
                    let a = left.as_float().ok_or_else(invalid)?;
                    let b = right.as_float().ok_or_else(invalid)?;
                    a.partial_cmp(&b)
                }
            };
            let result = match ordering {
                Some(ord) => match op {
                    Lt => ord.is_lt(),
                    LtEq => ord.is_le(),
                    Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
                // NaN compares false
                None => false,
            };
            Ok(Value::Bool(result))
        }
        Eq => Ok(Value::Bool(values_equal(left, right))),
        NotEq => Ok(Value::Bool(!values_equal(left, right))),
        And | Or => {
            let a = left.as_bool().ok_or_else(invalid)?;
            let b = right.as_bool().ok_or_else(invalid)?;
            Ok(Value::Bool(if op == And { a && b } else { a || b }))
        }
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, ExternError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(ExternError::DivideByZero),
        BinaryOp::Div => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.map(Value::Int).ok_or(ExternError::Overflow)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        (a, b) => a == b,
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, ExternError> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or(ExternError::Overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        _ => Err(ExternError::InvalidArguments(op.extern_name().to_string())),
    }
}
