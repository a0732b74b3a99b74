//! Static types of bound expressions

use vesper_ast::{Span, ValueType};
use vesper_vm::{ops, ExternFunction, ExternRegistry};

use crate::{BoundExpr, BoundExprKind, ClassLookup, SymbolTable, TypeError};

/// Everything needed to type an expression of one class
pub struct TypeEnv<'a> {
    pub table: &'a SymbolTable,
    pub classes: &'a dyn ClassLookup,
    pub externs: &'a ExternRegistry,
}

impl<'a> TypeEnv<'a> {
    pub fn new(table: &'a SymbolTable, classes: &'a dyn ClassLookup, externs: &'a ExternRegistry) -> Self {
        Self {
            table,
            classes,
            externs,
        }
    }

    /// Type of an expression that must produce a value
    pub fn value_type(&self, expr: &BoundExpr) -> Result<ValueType, TypeError> {
        self.type_of(expr)?
            .ok_or(TypeError::NoValue { span: expr.span })
    }

    /// Type of `expr`; `None` for calls returning nothing
    pub fn type_of(&self, expr: &BoundExpr) -> Result<Option<ValueType>, TypeError> {
        let ty = match &expr.kind {
            BoundExprKind::Literal(value) => value.value_type(),
            BoundExprKind::Symbol(id) => match self.table.get(*id) {
                Some(symbol) => symbol.value_type.clone(),
                None => {
                    return Err(TypeError::UnknownMember {
                        owner: "scope".into(),
                        name: format!("#{}", id.0),
                        span: expr.span,
                    })
                }
            },
            BoundExprKind::Extern {
                namespace,
                name,
                args,
            } => return Ok(self.resolve_extern(namespace, name, args, expr.span)?.ret.clone()),
            BoundExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                let class = self.behaviour_of(object)?;
                if class.method(method).filter(|m| m.is_public()).is_none() {
                    return Err(TypeError::UnknownMember {
                        owner: class.name.clone(),
                        name: method.clone(),
                        span: expr.span,
                    });
                }
                if !args.is_empty() {
                    return Err(TypeError::Arity {
                        name: method.clone(),
                        span: expr.span,
                    });
                }
                return Ok(None);
            }
            BoundExprKind::Member { object, name } => self.member_type(object, name, expr.span)?,
            BoundExprKind::Index { object, index } => {
                let object_ty = self.value_type(object)?;
                self.expect(&ValueType::Int, index)?;
                match object_ty.element() {
                    Some(element) => element.clone(),
                    None => {
                        return Err(TypeError::NotIndexable {
                            ty: object_ty,
                            span: object.span,
                        })
                    }
                }
            }
            BoundExprKind::Binary { op, left, right } => {
                let l = self.value_type(left)?;
                let r = self.value_type(right)?;
                ops::binary_type(*op, &l, &r).ok_or(TypeError::InvalidOperands {
                    op: op.symbol(),
                    left: l,
                    right: r,
                    span: expr.span,
                })?
            }
            BoundExprKind::Unary { op, operand } => {
                let t = self.value_type(operand)?;
                let symbol = match op {
                    vesper_ast::UnaryOp::Neg => "-",
                    vesper_ast::UnaryOp::Not => "!",
                };
                ops::unary_type(*op, &t).ok_or(TypeError::InvalidOperand {
                    op: symbol,
                    operand: t,
                    span: expr.span,
                })?
            }
            BoundExprKind::NewArray { ty, size, items } => {
                self.check_type_exists(ty, expr.span)?;
                if let Some(size) = size {
                    self.expect(&ValueType::Int, size)?;
                }
                if let (Some(items), Some(element)) = (items, ty.element()) {
                    for item in items {
                        self.expect(element, item)?;
                    }
                }
                ty.clone()
            }
            BoundExprKind::NewObject { ty } => {
                self.check_type_exists(ty, expr.span)?;
                ty.clone()
            }
            BoundExprKind::Intrinsic { .. } => return Ok(None),
        };
        Ok(Some(ty))
    }

    /// Check that `expr` can be stored into a slot of type `expected`
    pub fn expect(&self, expected: &ValueType, expr: &BoundExpr) -> Result<(), TypeError> {
        let found = self.value_type(expr)?;
        if expected.accepts(&found) {
            Ok(())
        } else {
            Err(TypeError::Mismatch {
                expected: expected.clone(),
                found,
                span: expr.span,
            })
        }
    }

    /// Pick the extern overload for a library call
    pub fn resolve_extern(
        &self,
        namespace: &str,
        name: &str,
        args: &[BoundExpr],
        span: Span,
    ) -> Result<&'a ExternFunction, TypeError> {
        let arg_types = args
            .iter()
            .map(|a| self.value_type(a))
            .collect::<Result<Vec<_>, _>>()?;
        self.externs
            .resolve(namespace, name, &arg_types)
            .ok_or_else(|| TypeError::NoOverload {
                name: format!("{}.{}", namespace, name),
                args: arg_types
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                span,
            })
    }

    /// User-declared types must name a known behaviour
    pub fn check_type_exists(&self, ty: &ValueType, span: Span) -> Result<(), TypeError> {
        match ty {
            ValueType::Array(element) => self.check_type_exists(element, span),
            ValueType::User(name) if self.classes.class(name).is_none() => Err(TypeError::UnknownType {
                name: name.clone(),
                span,
            }),
            _ => Ok(()),
        }
    }

    fn behaviour_of(&self, object: &BoundExpr) -> Result<&'a crate::ClassDefinition, TypeError> {
        let ty = self.value_type(object)?;
        match &ty {
            ValueType::User(name) => self.classes.class(name).ok_or(TypeError::UnknownType {
                name: name.clone(),
                span: object.span,
            }),
            _ => Err(TypeError::UnknownMember {
                owner: ty.to_string(),
                name: "method".into(),
                span: object.span,
            }),
        }
    }

    fn member_type(&self, object: &BoundExpr, name: &str, span: Span) -> Result<ValueType, TypeError> {
        let ty = self.value_type(object)?;
        if name == "length" && (ty.is_array() || ty.is_string()) {
            return Ok(ValueType::Int);
        }
        if let ValueType::User(class_name) = &ty {
            let class = self.classes.class(class_name).ok_or(TypeError::UnknownType {
                name: class_name.clone(),
                span: object.span,
            })?;
            if let Some(field) = class.field(name).filter(|f| f.is_public) {
                return Ok(field.declared_type.clone());
            }
        }
        Err(TypeError::UnknownMember {
            owner: ty.to_string(),
            name: name.to_string(),
            span,
        })
    }
}
