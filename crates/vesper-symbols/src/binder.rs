//! Reference module binder
//!
//! Parses one module, declares its fields, folds literal initializers
//! and resolves every name used in method bodies and initializers.
//! Binding is independent of every other module: references into other
//! behaviours stay unresolved until code generation.

use std::sync::atomic::{AtomicUsize, Ordering};

use vesper_ast::*;
use vesper_parser::parse;
use vesper_vm::{ExternRegistry, SyncMode};

use crate::*;

/// Last syntax node a binder visited
///
/// Shared with whoever runs the binder so an internal failure can still
/// be positioned after the binder itself is gone.
#[derive(Debug)]
pub struct NodeTracker {
    start: AtomicUsize,
    end: AtomicUsize,
}

impl NodeTracker {
    const NONE: usize = usize::MAX;

    pub fn new() -> Self {
        Self {
            start: AtomicUsize::new(Self::NONE),
            end: AtomicUsize::new(Self::NONE),
        }
    }

    pub fn visit(&self, span: Span) {
        self.start.store(span.start, Ordering::Relaxed);
        self.end.store(span.end, Ordering::Relaxed);
    }

    pub fn last(&self) -> Option<Span> {
        let start = self.start.load(Ordering::Relaxed);
        let end = self.end.load(Ordering::Relaxed);
        (start != Self::NONE).then(|| Span::new(start, end))
    }
}

impl Default for NodeTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifiers with this prefix belong to the compiler; user code cannot declare them
pub const RESERVED_PREFIX: &str = "__";

/// Binds module sources against a set of library references
#[derive(Debug, Clone)]
pub struct Binder<'a> {
    externs: &'a ExternRegistry,
    intrinsics: Vec<String>,
    allow_reserved: bool,
}

impl<'a> Binder<'a> {
    pub fn new(externs: &'a ExternRegistry) -> Self {
        Self {
            externs,
            intrinsics: Vec::new(),
            allow_reserved: false,
        }
    }

    /// Accept `name.method(..)` calls on a host-provided object
    pub fn with_intrinsic(mut self, name: impl Into<String>) -> Self {
        self.intrinsics.push(name.into());
        self
    }

    /// Accept declarations with [`RESERVED_PREFIX`], for compiler-written sources
    pub fn allow_reserved(mut self) -> Self {
        self.allow_reserved = true;
        self
    }

    pub fn bind(
        &self,
        script: &ScriptRef,
        source: &str,
        tracker: &NodeTracker,
    ) -> Result<ClassDefinition, Vec<BindError>> {
        let file = parse(source).map_err(|e| vec![BindError::Parse(e)])?;

        let mut ctx = BindContext {
            binder: self,
            tracker,
            table: SymbolTable::new(),
            resolver: ResolverContext::default(),
            method_names: file.item.methods().map(|m| m.name.clone()).collect(),
            errors: Vec::new(),
        };

        for using in &file.usings {
            tracker.visit(using.span);
            if !self.externs.has_namespace(&using.path) {
                ctx.errors.push(BindError::UnknownNamespace {
                    name: using.path.clone(),
                    span: using.span,
                });
            } else if !ctx.resolver.usings.contains(&using.path) {
                ctx.resolver.usings.push(using.path.clone());
            }
        }

        let mut fields = Vec::new();
        for decl in file.item.fields() {
            ctx.bind_field_decl(decl, &mut fields);
        }

        let mut methods = Vec::new();
        for method in file.item.methods() {
            if let Err(e) = ctx.check_not_reserved(&method.name, method.span) {
                ctx.errors.push(e);
                continue;
            }
            if fields.iter().any(|f: &FieldDefinition| f.name == method.name)
                || methods.iter().any(|m: &BoundMethod| m.name == method.name)
            {
                ctx.errors.push(BindError::Duplicate {
                    name: method.name.clone(),
                    span: method.span,
                });
                continue;
            }
            methods.push(ctx.bind_method(method));
        }

        if !ctx.table.is_balanced() {
            ctx.errors.push(BindError::Internal {
                message: "scope left open".into(),
                span: tracker.last().unwrap_or_default(),
            });
        }

        if !ctx.errors.is_empty() {
            return Err(ctx.errors);
        }

        Ok(ClassDefinition {
            name: file.item.name.clone(),
            kind: file.item.kind,
            script: script.clone(),
            symbols: ctx.table,
            fields,
            methods,
            resolver: ctx.resolver,
            span: file.item.span,
        })
    }
}

/// Bind `source` with the standard library references
pub fn bind_module(
    script: &ScriptRef,
    source: &str,
    externs: &ExternRegistry,
) -> Result<ClassDefinition, Vec<BindError>> {
    Binder::new(externs).bind(script, source, &NodeTracker::new())
}

struct BindContext<'b, 'a> {
    binder: &'b Binder<'a>,
    tracker: &'b NodeTracker,
    table: SymbolTable,
    resolver: ResolverContext,
    method_names: Vec<String>,
    errors: Vec<BindError>,
}

impl BindContext<'_, '_> {
    fn check_not_reserved(&self, name: &str, span: Span) -> Result<(), BindError> {
        if !self.binder.allow_reserved && name.starts_with(RESERVED_PREFIX) {
            return Err(BindError::ReservedName {
                name: name.to_string(),
                span,
            });
        }
        Ok(())
    }

    // === Fields ===

    fn bind_field_decl(&mut self, decl: &FieldDecl, fields: &mut Vec<FieldDefinition>) {
        self.tracker.visit(decl.span);

        let sync_mode = match self.sync_mode(decl) {
            Ok(mode) => mode,
            Err(e) => {
                self.errors.push(e);
                SyncMode::NotSynced
            }
        };

        let declared_type = decl.ty.resolve();
        let is_public = decl.visibility == Some(Visibility::Public);
        let mut flags = if is_public {
            DeclFlags::PUBLIC
        } else {
            DeclFlags::PRIVATE
        };
        if decl.is_const {
            flags = flags | DeclFlags::CONST;
        }

        for declarator in &decl.declarators {
            self.tracker.visit(declarator.span);

            if let Err(e) = self.check_not_reserved(&declarator.name, declarator.span) {
                self.errors.push(e);
                continue;
            }

            if decl.is_const && declarator.initializer.is_none() {
                self.errors.push(BindError::ConstWithoutInitializer {
                    name: declarator.name.clone(),
                    span: declarator.span,
                });
                continue;
            }

            let mut default_value = None;
            let mut initializer = None;
            if let Some(init) = &declarator.initializer {
                match self.bind_initializer(declarator, init, &declared_type) {
                    Ok((folded, bound)) => {
                        default_value = folded;
                        initializer = Some(bound);
                    }
                    Err(e) => {
                        self.errors.push(e);
                        continue;
                    }
                }
            }

            match self.table.define_field(
                &declarator.name,
                declared_type.clone(),
                flags,
                default_value,
                sync_mode,
            ) {
                Ok(symbol) => fields.push(FieldDefinition {
                    symbol,
                    name: declarator.name.clone(),
                    declared_type: declared_type.clone(),
                    is_const: decl.is_const,
                    is_public,
                    initializer,
                    span: declarator.span,
                }),
                Err(_) => self.errors.push(BindError::Duplicate {
                    name: declarator.name.clone(),
                    span: declarator.span,
                }),
            }
        }
    }

    fn sync_mode(&self, decl: &FieldDecl) -> Result<SyncMode, BindError> {
        let mut mode = SyncMode::NotSynced;
        for attr in &decl.attributes {
            if attr.name != "synced" {
                return Err(BindError::UnknownAttribute {
                    name: attr.name.clone(),
                    span: attr.span,
                });
            }
            mode = match &attr.arg {
                None => SyncMode::None,
                Some(arg) => SyncMode::parse(arg).ok_or_else(|| BindError::InvalidSyncMode {
                    mode: arg.clone(),
                    span: attr.span,
                })?,
            };
        }
        Ok(mode)
    }

    /// Bind an initializer; literals are also folded into a default value
    fn bind_initializer(
        &mut self,
        declarator: &VarDeclarator,
        init: &Initializer,
        declared_type: &ValueType,
    ) -> Result<(Option<Value>, FieldInitializer), BindError> {
        // Field initializers see the fields declared before them
        let expr = self.bind_expr(&init.expr)?;

        let folded = match init.expr.literal_value() {
            Some(value) => {
                let found = value.value_type();
                if !declared_type.accepts(&found) {
                    return Err(BindError::LiteralTypeMismatch {
                        name: declarator.name.clone(),
                        expected: declared_type.clone(),
                        found,
                        span: init.expr.span,
                    });
                }
                Some(match value {
                    Value::Int(n) if *declared_type == ValueType::Float => Value::Float(n as f64),
                    other => other,
                })
            }
            None => None,
        };

        Ok((
            folded.clone(),
            FieldInitializer {
                text: init.text.clone(),
                expr,
                is_literal: folded.is_some(),
                span: init.expr.span,
            },
        ))
    }

    // === Methods ===

    fn bind_method(&mut self, method: &MethodDecl) -> BoundMethod {
        self.tracker.visit(method.span);
        let body = self.bind_block(&method.body);
        BoundMethod {
            name: method.name.clone(),
            visibility: method.visibility.unwrap_or(Visibility::Private),
            body,
            span: method.span,
        }
    }

    fn bind_block(&mut self, block: &Block) -> Vec<BoundStmt> {
        self.table.open_scope();
        let mut stmts = Vec::new();
        for stmt in &block.stmts {
            match self.bind_stmt(stmt) {
                Ok(bound) => stmts.push(bound),
                Err(e) => self.errors.push(e),
            }
        }
        if self.table.close_scope().is_err() {
            self.errors.push(BindError::Internal {
                message: "unbalanced scope".into(),
                span: block.span,
            });
        }
        stmts
    }

    fn bind_stmt(&mut self, stmt: &Stmt) -> Result<BoundStmt, BindError> {
        self.tracker.visit(stmt.span);

        let kind = match &stmt.kind {
            StmtKind::Local { ty, name, init } => {
                self.check_not_reserved(name, stmt.span)?;
                let init = init.as_ref().map(|e| self.bind_expr(e)).transpose()?;
                let symbol = self
                    .table
                    .define_local(name, ty.resolve())
                    .map_err(|_| BindError::Duplicate {
                        name: name.clone(),
                        span: stmt.span,
                    })?;
                BoundStmtKind::Local { symbol, init }
            }
            StmtKind::Assign { target, value } => {
                let target = self.bind_assign_target(target)?;
                let value = self.bind_expr(value)?;
                BoundStmtKind::Assign { target, value }
            }
            StmtKind::Expr(expr) => {
                if !matches!(expr.kind, ExprKind::Call { .. }) {
                    return Err(BindError::NotAStatement { span: expr.span });
                }
                BoundStmtKind::Expr(self.bind_expr(expr)?)
            }
            StmtKind::Return => BoundStmtKind::Return,
        };

        Ok(BoundStmt {
            kind,
            span: stmt.span,
        })
    }

    fn bind_assign_target(&mut self, target: &Expr) -> Result<BoundExpr, BindError> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let bound = self.bind_expr(target)?;
                if let BoundExprKind::Symbol(id) = bound.kind {
                    if self.table.get(id).is_some_and(|s| s.flags.is_const()) {
                        return Err(BindError::AssignToConst {
                            name: name.clone(),
                            span: target.span,
                        });
                    }
                }
                Ok(bound)
            }
            ExprKind::Index { .. } | ExprKind::Member { .. } => self.bind_expr(target),
            _ => Err(BindError::InvalidAssignmentTarget { span: target.span }),
        }
    }

    // === Expressions ===

    fn bind_expr(&mut self, expr: &Expr) -> Result<BoundExpr, BindError> {
        self.tracker.visit(expr.span);

        let kind = match &expr.kind {
            ExprKind::Literal(lit) => BoundExprKind::Literal(lit.to_value()),
            ExprKind::Ident(name) => match self.table.lookup(name) {
                Some(id) => BoundExprKind::Symbol(id),
                None => return Err(self.undeclared(name, expr.span)),
            },
            ExprKind::Member { object, name } => BoundExprKind::Member {
                object: Box::new(self.bind_expr(object)?),
                name: name.clone(),
            },
            ExprKind::Call { callee, args } => return self.bind_call(callee, args, expr.span),
            ExprKind::Index { object, index } => BoundExprKind::Index {
                object: Box::new(self.bind_expr(object)?),
                index: Box::new(self.bind_expr(index)?),
            },
            ExprKind::Binary { op, left, right } => BoundExprKind::Binary {
                op: *op,
                left: Box::new(self.bind_expr(left)?),
                right: Box::new(self.bind_expr(right)?),
            },
            ExprKind::Unary { op, operand } => match expr.literal_value() {
                Some(value) => BoundExprKind::Literal(value),
                None => BoundExprKind::Unary {
                    op: *op,
                    operand: Box::new(self.bind_expr(operand)?),
                },
            },
            ExprKind::NewArray { ty, size, items } => BoundExprKind::NewArray {
                ty: ty.resolve(),
                size: size
                    .as_ref()
                    .map(|s| self.bind_expr(s).map(Box::new))
                    .transpose()?,
                items: items
                    .as_ref()
                    .map(|items| {
                        items
                            .iter()
                            .map(|i| self.bind_expr(i))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .transpose()?,
            },
            ExprKind::NewObject { ty } => BoundExprKind::NewObject { ty: ty.resolve() },
        };

        Ok(BoundExpr::new(kind, expr.span))
    }

    fn bind_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<BoundExpr, BindError> {
        let kind = match &callee.kind {
            // `max(a, b)` through a `using` namespace
            ExprKind::Ident(name) => {
                if self.table.lookup(name).is_some() {
                    return Err(BindError::Unsupported {
                        what: format!("calling '{}' as a function", name),
                        span: callee.span,
                    });
                }
                if self.method_names.contains(name) {
                    return Err(BindError::Unsupported {
                        what: format!("calling method '{}' of the same behaviour", name),
                        span: callee.span,
                    });
                }
                let namespace = self
                    .resolver
                    .usings
                    .iter()
                    .find(|ns| self.binder.externs.has_function(ns, name))
                    .cloned()
                    .ok_or_else(|| self.undeclared(name, callee.span))?;
                self.resolver.used.insert(namespace.clone());
                BoundExprKind::Extern {
                    namespace,
                    name: name.clone(),
                    args: self.bind_args(args)?,
                }
            }
            ExprKind::Member { object, name } => match &object.kind {
                ExprKind::Ident(target) if self.table.lookup(target).is_none() => {
                    if self.binder.intrinsics.contains(target) {
                        BoundExprKind::Intrinsic {
                            target: target.clone(),
                            name: name.clone(),
                            args: self.bind_args(args)?,
                        }
                    } else if self.binder.externs.has_namespace(target) {
                        if !self.binder.externs.has_function(target, name) {
                            return Err(BindError::UnknownFunction {
                                namespace: target.clone(),
                                name: name.clone(),
                                span: callee.span,
                            });
                        }
                        if self.resolver.usings.contains(target) {
                            self.resolver.used.insert(target.clone());
                        }
                        BoundExprKind::Extern {
                            namespace: target.clone(),
                            name: name.clone(),
                            args: self.bind_args(args)?,
                        }
                    } else {
                        return Err(self.undeclared(target, object.span));
                    }
                }
                _ => BoundExprKind::MethodCall {
                    object: Box::new(self.bind_expr(object)?),
                    method: name.clone(),
                    args: self.bind_args(args)?,
                },
            },
            _ => {
                return Err(BindError::Unsupported {
                    what: "calling this expression".into(),
                    span: callee.span,
                })
            }
        };

        Ok(BoundExpr::new(kind, span))
    }

    fn bind_args(&mut self, args: &[Expr]) -> Result<Vec<BoundExpr>, BindError> {
        args.iter().map(|a| self.bind_expr(a)).collect()
    }

    fn undeclared(&self, name: &str, span: Span) -> BindError {
        BindError::Undeclared {
            name: name.to_string(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(source: &str) -> Result<ClassDefinition, Vec<BindError>> {
        bind_module(&ScriptRef::from("Door.vsp"), source, &ExternRegistry::standard())
    }

    #[test]
    fn test_fields_and_literal_folding() {
        let class = bind(
            r#"
behaviour Door {
    public float speed = 2;
    [synced(linear)] private string owner;
    const int LIMIT = 10;
    public int[] ids = new int[3];
}
"#,
        )
        .unwrap();

        assert_eq!(class.name, "Door");
        let speed = class.symbols.by_unique_name("speed").unwrap();
        assert_eq!(speed.default_value, Some(Value::Float(2.0)));
        assert!(speed.flags.is_public());

        let owner = class.symbols.by_unique_name("owner").unwrap();
        assert_eq!(owner.sync_mode, SyncMode::Linear);
        assert!(owner.flags.is_private());

        let limit = class.field("LIMIT").unwrap();
        assert!(limit.is_const);
        assert!(!limit.needs_evaluation());

        let names: Vec<_> = class.fields_with_initializers().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ids"]);
        assert_eq!(class.field("ids").unwrap().initializer.as_ref().unwrap().text, "new int[3]");
    }

    #[test]
    fn test_undeclared_name_is_error() {
        let errors = bind("behaviour C { fn f() { missing = 3; } }").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], BindError::Undeclared { name, .. } if name == "missing"));
        assert_eq!(errors[0].code(), "E-BIND-002");
    }

    #[test]
    fn test_usings_resolve_free_calls() {
        let class = bind(
            r#"
using Math;
using Strings;
behaviour A {
    public int top = max(1, 2);
}
"#,
        )
        .unwrap();
        let unused: Vec<_> = class.resolver.unused().collect();
        assert_eq!(unused, vec!["Strings"]);

        let errors = bind("behaviour A { public int top = max(1, 2); }").unwrap_err();
        assert!(matches!(&errors[0], BindError::Undeclared { name, .. } if name == "max"));
    }

    #[test]
    fn test_unknown_namespace_and_function() {
        let errors = bind("using Physics; behaviour A { }").unwrap_err();
        assert!(matches!(errors[0], BindError::UnknownNamespace { .. }));

        let errors = bind("behaviour A { public int x = Math.nope(1); }").unwrap_err();
        assert!(matches!(errors[0], BindError::UnknownFunction { .. }));
    }

    #[test]
    fn test_locals_scoped_and_tables_balanced() {
        let class = bind(
            r#"
behaviour A {
    public int total;
    fn run() {
        int n = 2;
        total = n * 3;
    }
    fn again() {
        int n = 5;
        total = n;
    }
}
"#,
        )
        .unwrap();
        assert!(class.symbols.is_balanced());
        let locals: Vec<_> = class
            .symbols
            .all_unique_symbols()
            .filter(|s| s.original_name == "n")
            .map(|s| s.unique_name.clone())
            .collect();
        assert_eq!(locals, vec!["__n_0", "__n_1"]);
    }

    #[test]
    fn test_const_rules() {
        let errors = bind("behaviour A { const int X; }").unwrap_err();
        assert!(matches!(errors[0], BindError::ConstWithoutInitializer { .. }));

        let errors = bind("behaviour A { const int X = 1; fn f() { X = 2; } }").unwrap_err();
        assert!(matches!(errors[0], BindError::AssignToConst { .. }));
    }

    #[test]
    fn test_literal_type_mismatch() {
        let errors = bind("behaviour A { public int x = \"no\"; }").unwrap_err();
        assert!(matches!(errors[0], BindError::LiteralTypeMismatch { .. }));
    }

    #[test]
    fn test_parse_error_is_bind_error() {
        let errors = bind("behaviour A { public int = 1; }").unwrap_err();
        assert!(matches!(errors[0], BindError::Parse(_)));
    }

    #[test]
    fn test_intrinsics_only_when_enabled() {
        let source = "initializer I { fn init() { program.store(\"x\", 1); } }";
        let errors = bind(source).unwrap_err();
        assert!(matches!(&errors[0], BindError::Undeclared { name, .. } if name == "program"));

        let externs = ExternRegistry::standard();
        let class = Binder::new(&externs)
            .with_intrinsic("program")
            .bind(&ScriptRef::from("init"), source, &NodeTracker::new())
            .unwrap();
        let method = class.method("init").unwrap();
        assert!(matches!(
            &method.body[0].kind,
            BoundStmtKind::Expr(BoundExpr { kind: BoundExprKind::Intrinsic { .. }, .. })
        ));
    }

    #[test]
    fn test_reserved_prefix_cannot_be_declared() {
        let errors = bind("behaviour A { public int __x; fn __run() { int __y = 1; } }").unwrap_err();
        let names: Vec<&str> = errors
            .iter()
            .filter_map(|e| match e {
                BindError::ReservedName { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["__x", "__run"]);
        assert_eq!(errors[0].code(), "E-BIND-014");

        let externs = ExternRegistry::standard();
        let source = "initializer I { fn __init() { int __y = 1; } }";
        assert!(Binder::new(&externs)
            .allow_reserved()
            .bind(&ScriptRef::from("init"), source, &NodeTracker::new())
            .is_ok());
    }

    #[test]
    fn test_tracker_records_last_node() {
        let tracker = NodeTracker::new();
        assert_eq!(tracker.last(), None);
        let externs = ExternRegistry::standard();
        let source = "behaviour A { public int x = 1 + 2; }";
        Binder::new(&externs)
            .bind(&ScriptRef::from("a"), source, &tracker)
            .unwrap();
        assert!(tracker.last().is_some());
    }
}
