//! Bound class → assembly text

use std::fmt::Write;

use vesper_ast::{Span, Value, ValueType};
use vesper_symbols::{
    BoundExpr, BoundExprKind, BoundMethod, BoundStmt, BoundStmtKind, ClassDefinition, ClassLookup,
    SymbolId, SymbolTable, TypeEnv, TypeError,
};
use vesper_vm::{ops, ExternRegistry, HALT_ADDRESS};

use crate::{GenerateError, GeneratedModule};

const ARRAY_CTOR: &str = "Array.ctor__Int__Object";
const ARRAY_GET: &str = "Array.get__Object_Int__Object";
const ARRAY_SET: &str = "Array.set__Object_Int_Object__Void";
const ARRAY_LENGTH: &str = "Array.length__Object__Int";
const STRING_LENGTH: &str = "String.length__String__Int";
const BEHAVIOUR_SEND: &str = "Behaviour.send__Object_String__Void";
const BEHAVIOUR_GET: &str = "Behaviour.get__Object_String__Object";

pub struct Emitter<'a> {
    class: &'a ClassDefinition,
    classes: &'a dyn ClassLookup,
    externs: &'a ExternRegistry,
    table: SymbolTable,
    code: String,
    errors: Vec<GenerateError>,
}

impl<'a> Emitter<'a> {
    pub fn new(class: &'a ClassDefinition, classes: &'a dyn ClassLookup, externs: &'a ExternRegistry) -> Self {
        Self {
            class,
            classes,
            externs,
            table: class.symbols.clone(),
            code: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn emit(mut self) -> Result<GeneratedModule, Vec<GenerateError>> {
        let class = self.class;
        for field in &class.fields {
            if let Err(e) = self.env().check_type_exists(&field.declared_type, field.span) {
                self.errors.push(e.into());
            }
        }

        for method in &class.methods {
            self.method(method);
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let assembly = format!(
            ".data_start\n{}.data_end\n\n.code_start\n{}.code_end\n",
            self.data_section(),
            self.code
        );
        Ok(GeneratedModule {
            assembly,
            symbol_count: self.table.len(),
            symbols: self.table,
        })
    }

    fn env(&self) -> TypeEnv<'_> {
        TypeEnv::new(&self.table, self.classes, self.externs)
    }

    fn data_section(&self) -> String {
        let mut out = String::new();
        for field in &self.class.fields {
            if field.is_public {
                let _ = writeln!(out, "    .export {}", field.name);
            }
            if let Some(symbol) = self.table.get(field.symbol) {
                if symbol.sync_mode.is_synced() {
                    let _ = writeln!(out, "    .sync {}, {}", field.name, symbol.sync_mode);
                }
            }
        }
        for symbol in self.table.all_unique_symbols() {
            let _ = writeln!(
                out,
                "    {}: %{}, null",
                symbol.unique_name,
                heap_type(&symbol.value_type).assembly_name()
            );
        }
        out
    }

    // === Statements ===

    fn method(&mut self, method: &BoundMethod) {
        if method.is_public() {
            self.line(&format!(".export {}", method.name));
        }
        self.line(&format!("{}:", method.name));
        for stmt in &method.body {
            if let Err(e) = self.stmt(stmt) {
                self.errors.push(e);
            }
        }
        self.op(&format!("JUMP, {:#X}", HALT_ADDRESS));
    }

    fn stmt(&mut self, stmt: &BoundStmt) -> Result<(), GenerateError> {
        match &stmt.kind {
            BoundStmtKind::Local { symbol, init } => {
                let ty = self.symbol_type(*symbol, stmt.span)?;
                self.env().check_type_exists(&ty, stmt.span)?;
                if let Some(init) = init {
                    self.env().expect(&ty, init)?;
                    let value = self.value(init)?;
                    self.copy(value, *symbol);
                }
            }
            BoundStmtKind::Assign { target, value } => match &target.kind {
                BoundExprKind::Symbol(id) => {
                    let ty = self.symbol_type(*id, target.span)?;
                    self.env().expect(&ty, value)?;
                    let value = self.value(value)?;
                    self.copy(value, *id);
                }
                BoundExprKind::Index { object, index } => {
                    let element = self.env().value_type(target)?;
                    self.env().expect(&element, value)?;
                    let array = self.value(object)?;
                    let index = self.value(index)?;
                    let value = self.value(value)?;
                    self.push(array);
                    self.push(index);
                    self.push(value);
                    self.call_extern(ARRAY_SET);
                }
                _ => {
                    return Err(GenerateError::Unsupported {
                        what: "assigning to a member of another behaviour".into(),
                        span: target.span,
                    })
                }
            },
            BoundStmtKind::Expr(expr) => {
                self.env().type_of(expr)?;
                self.expr(expr)?;
            }
            BoundStmtKind::Return => self.op(&format!("JUMP, {:#X}", HALT_ADDRESS)),
        }
        Ok(())
    }

    // === Expressions ===

    fn value(&mut self, expr: &BoundExpr) -> Result<SymbolId, GenerateError> {
        self.expr(expr)?
            .ok_or_else(|| TypeError::NoValue { span: expr.span }.into())
    }

    /// Emit `expr`; returns the symbol holding its value
    fn expr(&mut self, expr: &BoundExpr) -> Result<Option<SymbolId>, GenerateError> {
        match &expr.kind {
            BoundExprKind::Literal(value) => Ok(Some(self.table.define_constant(value))),
            BoundExprKind::Symbol(id) => Ok(Some(*id)),
            BoundExprKind::Extern {
                namespace,
                name,
                args,
            } => {
                let (id, ret) = {
                    let function = self.env().resolve_extern(namespace, name, args, expr.span)?;
                    (function.id(), function.ret.clone())
                };
                let args = args
                    .iter()
                    .map(|a| self.value(a))
                    .collect::<Result<Vec<_>, _>>()?;
                for arg in args {
                    self.push(arg);
                }
                let result = ret.map(|ty| self.table.define_temporary(ty));
                if let Some(result) = result {
                    self.push(result);
                }
                self.call_extern(&id);
                Ok(result)
            }
            BoundExprKind::MethodCall { object, method, .. } => {
                self.env().type_of(expr)?;
                let target = self.value(object)?;
                let name = self.table.define_constant(&Value::string(method.as_str()));
                self.push(target);
                self.push(name);
                self.call_extern(BEHAVIOUR_SEND);
                Ok(None)
            }
            BoundExprKind::Member { object, name } => {
                let ty = self.env().value_type(expr)?;
                let object_ty = self.env().value_type(object)?;
                let target = self.value(object)?;
                let result = self.table.define_temporary(ty);
                self.push(target);
                if name == "length" && object_ty.is_array() {
                    self.push(result);
                    self.call_extern(ARRAY_LENGTH);
                } else if name == "length" && object_ty.is_string() {
                    self.push(result);
                    self.call_extern(STRING_LENGTH);
                } else {
                    let field = self.table.define_constant(&Value::string(name.as_str()));
                    self.push(field);
                    self.push(result);
                    self.call_extern(BEHAVIOUR_GET);
                }
                Ok(Some(result))
            }
            BoundExprKind::Index { object, index } => {
                let ty = self.env().value_type(expr)?;
                let array = self.value(object)?;
                let index = self.value(index)?;
                let result = self.table.define_temporary(ty);
                self.push(array);
                self.push(index);
                self.push(result);
                self.call_extern(ARRAY_GET);
                Ok(Some(result))
            }
            BoundExprKind::Binary { op, left, right } => {
                let ty = self.env().value_type(expr)?;
                let l_ty = self.env().value_type(left)?;
                let r_ty = self.env().value_type(right)?;
                let namespace = ops::operator_namespace(&l_ty, &r_ty);
                let id = self
                    .externs
                    .resolve(namespace, op.extern_name(), &[l_ty.clone(), r_ty.clone()])
                    .map(|f| f.id())
                    .ok_or(TypeError::InvalidOperands {
                        op: op.symbol(),
                        left: l_ty,
                        right: r_ty,
                        span: expr.span,
                    })?;
                let l = self.value(left)?;
                let r = self.value(right)?;
                let result = self.table.define_temporary(ty);
                self.push(l);
                self.push(r);
                self.push(result);
                self.call_extern(&id);
                Ok(Some(result))
            }
            BoundExprKind::Unary { op, operand } => {
                let ty = self.env().value_type(expr)?;
                let operand_ty = self.env().value_type(operand)?;
                let id = self
                    .externs
                    .resolve(&operand_ty.assembly_name(), op.extern_name(), &[operand_ty.clone()])
                    .map(|f| f.id())
                    .ok_or_else(|| GenerateError::Internal {
                        message: format!("no {} extern for {}", op.extern_name(), operand_ty),
                        span: expr.span,
                    })?;
                let value = self.value(operand)?;
                let result = self.table.define_temporary(ty);
                self.push(value);
                self.push(result);
                self.call_extern(&id);
                Ok(Some(result))
            }
            BoundExprKind::NewArray { ty, size, items } => {
                self.env().value_type(expr)?;
                let size = match (size, items) {
                    (Some(size), _) => self.value(size)?,
                    (None, Some(items)) => self.table.define_constant(&Value::Int(items.len() as i64)),
                    (None, None) => self.table.define_constant(&Value::Int(0)),
                };
                let result = self.table.define_temporary(ty.clone());
                self.push(size);
                self.push(result);
                self.call_extern(ARRAY_CTOR);

                for (i, item) in items.iter().flatten().enumerate() {
                    let value = self.value(item)?;
                    let index = self.table.define_constant(&Value::Int(i as i64));
                    self.push(result);
                    self.push(index);
                    self.push(value);
                    self.call_extern(ARRAY_SET);
                }
                Ok(Some(result))
            }
            BoundExprKind::NewObject { ty } => Err(GenerateError::ObjectCreation {
                ty: ty.clone(),
                span: expr.span,
            }),
            BoundExprKind::Intrinsic { target, name, .. } => Err(GenerateError::Unsupported {
                what: format!("'{}.{}'", target, name),
                span: expr.span,
            }),
        }
    }

    fn symbol_type(&self, id: SymbolId, span: Span) -> Result<ValueType, GenerateError> {
        self.table
            .get(id)
            .map(|s| s.value_type.clone())
            .ok_or_else(|| GenerateError::Internal {
                message: format!("unknown symbol #{}", id.0),
                span,
            })
    }

    // === Output ===

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.code, "    {}", text);
    }

    fn op(&mut self, text: &str) {
        let _ = writeln!(self.code, "        {}", text);
    }

    fn push(&mut self, id: SymbolId) {
        let name = self
            .table
            .get(id)
            .map(|s| s.unique_name.clone())
            .unwrap_or_default();
        self.op(&format!("PUSH, {}", name));
    }

    fn copy(&mut self, from: SymbolId, to: SymbolId) {
        self.push(from);
        self.push(to);
        self.op("COPY");
    }

    fn call_extern(&mut self, id: &str) {
        self.op(&format!("EXTERN, \"{}\"", id));
    }
}

/// Jagged arrays live on the heap as object arrays
fn heap_type(ty: &ValueType) -> ValueType {
    if ty.is_jagged() {
        ValueType::array_of(ValueType::Object)
    } else {
        ty.clone()
    }
}
