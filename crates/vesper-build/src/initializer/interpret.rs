//! In-process backend: binds every unit against the loaded library
//! references, type-checks it and lowers it into routines evaluated
//! directly over heap values

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use vesper_ast::{BinaryOp, LinePosition, ScriptRef, Span, Value, ValueType};
use vesper_symbols::{
    Binder, BoundExpr, BoundExprKind, BoundStmt, BoundStmtKind, ClassDefinition, ClassLookup, NodeTracker,
    SymbolId, TypeEnv, TypeError,
};
use vesper_vm::{ops, ExternError, ExternFunction, ExternRegistry, Program};

use super::synthesize::{ENTRY_ROUTINE, PROGRAM_INTRINSIC};
use super::{
    HeapBridge, InitializerAssembly, InitializerBackend, InitializerCompilation, InitializerDiagnostic,
    InitializerFault, InitializerUnit, Severity, StoreRoute,
};

#[derive(Debug, Clone)]
pub struct InterpretedBackend {
    externs: Arc<ExternRegistry>,
}

impl InterpretedBackend {
    pub fn new(externs: Arc<ExternRegistry>) -> Self {
        Self { externs }
    }

    fn compile_unit(
        &self,
        unit: &InitializerUnit,
        classes: &dyn ClassLookup,
        diagnostics: &mut Vec<InitializerDiagnostic>,
    ) -> Option<Routine> {
        let script = ScriptRef::new(format!("{}.vsp", unit.class_name));
        let binder = Binder::new(&self.externs)
            .with_intrinsic(PROGRAM_INTRINSIC)
            .allow_reserved();
        let class = match binder.bind(&script, &unit.source, &NodeTracker::new()) {
            Ok(class) => class,
            Err(errors) => {
                for e in errors {
                    diagnostics.push(error_at(unit, e.to_string(), Some(e.code()), e.span()));
                }
                return None;
            }
        };

        for using in class.resolver.unused() {
            let offset = unit.source.find(&format!("using {};", using)).unwrap_or(0);
            diagnostics.push(InitializerDiagnostic {
                severity: Severity::Warning,
                unit: unit.index,
                message: format!("using directive '{}' is unnecessary", using),
                code: None,
                position: LinePosition::of(&unit.source, offset),
            });
        }

        let mut lowering = Lowering {
            unit,
            class: &class,
            env: TypeEnv::new(&class.symbols, classes, &self.externs),
            errors: Vec::new(),
        };
        let routine = lowering.routine();
        if lowering.errors.is_empty() {
            return Some(routine);
        }
        for e in lowering.errors {
            diagnostics.push(error_at(unit, e.message, e.code, e.span));
        }
        None
    }
}

impl InitializerBackend for InterpretedBackend {
    fn compile(
        &self,
        assembly_id: &str,
        units: &[InitializerUnit],
        classes: &dyn ClassLookup,
    ) -> InitializerCompilation {
        let mut diagnostics = Vec::new();
        let mut routines = BTreeMap::new();
        for unit in units {
            if let Some(routine) = self.compile_unit(unit, classes, &mut diagnostics) {
                routines.insert(unit.class_name.clone(), routine);
            }
        }

        let assembly = if diagnostics.iter().any(|d| d.is_error()) {
            None
        } else {
            Some(Box::new(InterpretedAssembly {
                id: assembly_id.to_string(),
                routines,
            }) as Box<dyn InitializerAssembly>)
        };
        InitializerCompilation { diagnostics, assembly }
    }
}

fn error_at(unit: &InitializerUnit, message: String, code: Option<&'static str>, span: Span) -> InitializerDiagnostic {
    InitializerDiagnostic {
        severity: Severity::Error,
        unit: unit.index,
        message,
        code,
        position: LinePosition::of(&unit.source, span.start),
    }
}

// === Lowering ===

struct LoweringError {
    message: String,
    code: Option<&'static str>,
    span: Span,
}

impl LoweringError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            code: None,
            span,
        }
    }
}

impl From<TypeError> for LoweringError {
    fn from(e: TypeError) -> Self {
        Self {
            message: e.to_string(),
            code: Some(e.code()),
            span: e.span(),
        }
    }
}

struct Lowering<'u, 'a> {
    unit: &'u InitializerUnit,
    class: &'a ClassDefinition,
    env: TypeEnv<'a>,
    errors: Vec<LoweringError>,
}

impl Lowering<'_, '_> {
    fn routine(&mut self) -> Routine {
        let class = self.class;
        let mut steps = Vec::new();

        // Unit-level constants, in declaration order
        for field in &class.fields {
            let Some(init) = &field.initializer else {
                continue;
            };
            match self.typed(&field.declared_type, &init.expr) {
                Ok(value) => steps.push(Step::Local {
                    slot: field.symbol,
                    ty: field.declared_type.clone(),
                    init: Some(value),
                }),
                Err(e) => self.errors.push(e),
            }
        }

        match class.method(ENTRY_ROUTINE) {
            Some(method) => {
                for stmt in &method.body {
                    match self.step(stmt) {
                        Ok(step) => steps.push(step),
                        Err(e) => self.errors.push(e),
                    }
                }
            }
            None => self.errors.push(LoweringError::new(
                format!("initializer unit has no '{}' routine", ENTRY_ROUTINE),
                class.span,
            )),
        }

        Routine { steps }
    }

    fn step(&self, stmt: &BoundStmt) -> Result<Step, LoweringError> {
        match &stmt.kind {
            BoundStmtKind::Local { symbol, init } => {
                let ty = self.symbol_type(*symbol, stmt.span)?;
                self.env.check_type_exists(&ty, stmt.span)?;
                let init = init.as_ref().map(|e| self.typed(&ty, e)).transpose()?;
                Ok(Step::Local {
                    slot: *symbol,
                    ty,
                    init,
                })
            }
            BoundStmtKind::Assign { target, value } => match &target.kind {
                BoundExprKind::Symbol(id) => {
                    let ty = self.symbol_type(*id, target.span)?;
                    Ok(Step::Assign {
                        slot: *id,
                        value: self.typed(&ty, value)?,
                        ty,
                    })
                }
                _ => Err(LoweringError::new(
                    "only locals can be assigned in a field initializer",
                    target.span,
                )),
            },
            BoundStmtKind::Expr(expr) => match &expr.kind {
                BoundExprKind::Intrinsic { target, name, args } => self.store(target, name, args, expr.span),
                _ => {
                    self.env.type_of(expr)?;
                    Ok(Step::Eval(self.lower(expr)?))
                }
            },
            BoundStmtKind::Return => Ok(Step::Return),
        }
    }

    /// `__program.store("sym", value)` with its heap route fixed here
    fn store(&self, target: &str, name: &str, args: &[BoundExpr], span: Span) -> Result<Step, LoweringError> {
        if target != PROGRAM_INTRINSIC || !(name == "store" || name == "store_serialized") {
            return Err(LoweringError::new(
                format!("'{}.{}' is not available to field initializers", target, name),
                span,
            ));
        }
        let [symbol, value] = args else {
            return Err(LoweringError::new(
                format!("'{}.{}' takes a symbol name and a value", target, name),
                span,
            ));
        };
        let BoundExprKind::Literal(Value::Str(symbol_name)) = &symbol.kind else {
            return Err(LoweringError::new(
                "the symbol name must be a string literal",
                symbol.span,
            ));
        };
        let ty = self.unit.targets.get(symbol_name).ok_or_else(|| {
            LoweringError::new(
                format!("'{}' is not a field of {}", symbol_name, self.unit.script),
                symbol.span,
            )
        })?;

        let route = StoreRoute::for_type(ty);
        match (&route, name) {
            (StoreRoute::Serialized, "store") => {
                return Err(LoweringError::new(
                    format!("'{}' values must be stored with store_serialized", ty),
                    span,
                ))
            }
            (StoreRoute::Direct(_), "store_serialized") => {
                return Err(LoweringError::new(
                    format!("'{}' values must be stored with store", ty),
                    span,
                ))
            }
            _ => {}
        }

        Ok(Step::Store(StoreOp {
            symbol: symbol_name.clone(),
            ty: ty.clone(),
            route,
            value: self.typed(ty, value)?,
        }))
    }

    fn symbol_type(&self, id: SymbolId, span: Span) -> Result<ValueType, LoweringError> {
        self.class
            .symbol(id)
            .map(|s| s.value_type.clone())
            .ok_or_else(|| LoweringError::new("unknown local", span))
    }

    /// Lower `expr` after checking it fits a slot of type `ty`
    fn typed(&self, ty: &ValueType, expr: &BoundExpr) -> Result<Eval, LoweringError> {
        self.env.expect(ty, expr)?;
        self.lower(expr)
    }

    fn lower_all(&self, exprs: &[BoundExpr]) -> Result<Vec<Eval>, LoweringError> {
        exprs.iter().map(|e| self.lower(e)).collect()
    }

    fn lower(&self, expr: &BoundExpr) -> Result<Eval, LoweringError> {
        Ok(match &expr.kind {
            BoundExprKind::Literal(value) => Eval::Const(value.clone()),
            BoundExprKind::Symbol(id) => Eval::Load(*id),
            BoundExprKind::Extern {
                namespace,
                name,
                args,
            } => Eval::Call {
                function: self.env.resolve_extern(namespace, name, args, expr.span)?.clone(),
                args: self.lower_all(args)?,
            },
            BoundExprKind::MethodCall { method, .. } => {
                return Err(LoweringError::new(
                    format!("cannot call behaviour method '{}' from a field initializer", method),
                    expr.span,
                ))
            }
            BoundExprKind::Member { object, name } => {
                let object_ty = self.env.value_type(object)?;
                let lowered = Box::new(self.lower(object)?);
                if name == "length" && (object_ty.is_array() || object_ty.is_string()) {
                    Eval::Length(lowered)
                } else {
                    self.env.type_of(expr)?;
                    Eval::Field {
                        object: lowered,
                        name: name.clone(),
                    }
                }
            }
            BoundExprKind::Index { object, index } => Eval::Index {
                object: Box::new(self.lower(object)?),
                index: Box::new(self.lower(index)?),
            },
            BoundExprKind::Binary { op, left, right } => Eval::Binary {
                op: *op,
                left: Box::new(self.lower(left)?),
                right: Box::new(self.lower(right)?),
            },
            BoundExprKind::Unary { op, operand } => Eval::Unary {
                op: *op,
                operand: Box::new(self.lower(operand)?),
            },
            BoundExprKind::NewArray { ty, size, items } => Eval::NewArray {
                element: ty.element().cloned().unwrap_or(ValueType::Object),
                size: size.as_ref().map(|s| self.lower(s).map(Box::new)).transpose()?,
                items: items.as_ref().map(|items| self.lower_all(items)).transpose()?,
            },
            BoundExprKind::NewObject { ty } => self.new_object(ty, expr.span)?,
            BoundExprKind::Intrinsic { target, name, .. } => {
                return Err(LoweringError::new(
                    format!("'{}.{}' does not produce a value", target, name),
                    expr.span,
                ))
            }
        })
    }

    /// Instance of a behaviour with every field at its default
    fn new_object(&self, ty: &ValueType, span: Span) -> Result<Eval, LoweringError> {
        let ValueType::User(name) = ty else {
            return Err(LoweringError::new(format!("cannot create '{}' values", ty), span));
        };
        let class = self.env.classes.class(name).ok_or_else(|| TypeError::UnknownType {
            name: name.clone(),
            span,
        })?;
        let fields = class
            .fields
            .iter()
            .map(|f| {
                let value = class
                    .symbol(f.symbol)
                    .and_then(|s| s.default_value.clone())
                    .unwrap_or_else(|| Value::default_for(&f.declared_type));
                (f.name.clone(), value)
            })
            .collect();
        Ok(Eval::NewObject {
            class: name.clone(),
            fields,
        })
    }
}

// === Evaluation ===

#[derive(Debug, Clone)]
enum Eval {
    Const(Value),
    Load(SymbolId),
    Call {
        function: ExternFunction,
        args: Vec<Eval>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Eval>,
        right: Box<Eval>,
    },
    Unary {
        op: vesper_ast::UnaryOp,
        operand: Box<Eval>,
    },
    Index {
        object: Box<Eval>,
        index: Box<Eval>,
    },
    Length(Box<Eval>),
    Field {
        object: Box<Eval>,
        name: String,
    },
    NewArray {
        element: ValueType,
        size: Option<Box<Eval>>,
        items: Option<Vec<Eval>>,
    },
    NewObject {
        class: String,
        fields: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone)]
struct StoreOp {
    symbol: String,
    ty: ValueType,
    route: StoreRoute,
    value: Eval,
}

#[derive(Debug, Clone)]
enum Step {
    Local {
        slot: SymbolId,
        ty: ValueType,
        init: Option<Eval>,
    },
    Assign {
        slot: SymbolId,
        ty: ValueType,
        value: Eval,
    },
    Eval(Eval),
    Store(StoreOp),
    Return,
}

#[derive(Debug, Clone)]
struct Routine {
    steps: Vec<Step>,
}

impl Routine {
    fn run(&self, program: &mut Program, bridge: &HeapBridge) -> Result<(), InitializerFault> {
        let mut frame = Frame::default();
        for step in &self.steps {
            match step {
                Step::Local { slot, ty, init } => {
                    let value = match init {
                        Some(init) => coerce(frame.eval(init)?, ty),
                        None => Value::default_for(ty),
                    };
                    frame.slots.insert(*slot, value);
                }
                Step::Assign { slot, ty, value } => {
                    let value = coerce(frame.eval(value)?, ty);
                    frame.slots.insert(*slot, value);
                }
                Step::Eval(expr) => {
                    frame.eval(expr)?;
                }
                Step::Store(op) => {
                    let value = coerce(frame.eval(&op.value)?, &op.ty);
                    bridge.store(program, &op.symbol, &op.ty, &op.route, value)?;
                }
                Step::Return => break,
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Frame {
    slots: HashMap<SymbolId, Value>,
}

impl Frame {
    fn eval(&self, expr: &Eval) -> Result<Value, ExternError> {
        Ok(match expr {
            Eval::Const(value) => value.clone(),
            Eval::Load(slot) => self.slots.get(slot).cloned().unwrap_or(Value::Null),
            Eval::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                function.invoke(&args)?
            }
            Eval::Binary { op, left, right } if op.is_logical() => {
                let left = self.eval(left)?;
                // Short-circuit
                match (op, left.as_bool()) {
                    (BinaryOp::And, Some(false)) => Value::Bool(false),
                    (BinaryOp::Or, Some(true)) => Value::Bool(true),
                    _ => ops::binary(*op, &left, &self.eval(right)?)?,
                }
            }
            Eval::Binary { op, left, right } => ops::binary(*op, &self.eval(left)?, &self.eval(right)?)?,
            Eval::Unary { op, operand } => ops::unary(*op, &self.eval(operand)?)?,
            Eval::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self
                    .eval(index)?
                    .as_int()
                    .ok_or_else(|| ExternError::InvalidArguments("index".into()))?;
                match object {
                    Value::Array { items, .. } => usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or(ExternError::IndexOutOfRange {
                            index,
                            length: items.len(),
                        })?,
                    Value::Null => return Err(ExternError::NullReference),
                    _ => return Err(ExternError::InvalidArguments("index".into())),
                }
            }
            Eval::Length(object) => match self.eval(object)? {
                Value::Array { items, .. } => Value::Int(items.len() as i64),
                Value::Str(s) => Value::Int(s.chars().count() as i64),
                Value::Null => return Err(ExternError::NullReference),
                _ => return Err(ExternError::InvalidArguments("length".into())),
            },
            Eval::Field { object, name } => match self.eval(object)? {
                Value::Object { fields, .. } => fields.get(name).cloned().unwrap_or(Value::Null),
                Value::Null => return Err(ExternError::NullReference),
                _ => return Err(ExternError::InvalidArguments(name.clone())),
            },
            Eval::NewArray { element, size, items } => match (items, size) {
                (Some(items), _) => Value::Array {
                    element: element.clone(),
                    items: items
                        .iter()
                        .map(|i| self.eval(i).map(|v| coerce(v, element)))
                        .collect::<Result<Vec<_>, _>>()?,
                },
                (None, Some(size)) => {
                    let len = self
                        .eval(size)?
                        .as_int()
                        .ok_or_else(|| ExternError::InvalidArguments("array size".into()))?;
                    let len = ops::array_len(len)?;
                    Value::array_of_len(element.clone(), len)
                }
                (None, None) => Value::empty_array(element.clone()),
            },
            Eval::NewObject { class, fields } => Value::Object {
                class: class.clone(),
                fields: fields.clone(),
            },
        })
    }
}

/// Integers stored into float slots are widened
fn coerce(value: Value, ty: &ValueType) -> Value {
    match (value, ty) {
        (Value::Int(n), ValueType::Float) => Value::Float(n as f64),
        (value, _) => value,
    }
}

struct InterpretedAssembly {
    id: String,
    routines: BTreeMap<String, Routine>,
}

impl InitializerAssembly for InterpretedAssembly {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, class_name: &str, program: &mut Program, bridge: &HeapBridge) -> Result<(), InitializerFault> {
        let routine = self
            .routines
            .get(class_name)
            .ok_or_else(|| InitializerFault::MissingEntry(class_name.to_string()))?;
        routine.run(program, bridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::synthesize;
    use vesper_codegen::generate;
    use vesper_symbols::bind_module;
    use vesper_vm::assemble;

    fn module(source: &str) -> (ClassDefinition, Program) {
        let externs = ExternRegistry::standard();
        let class = bind_module(&"Door.vsp".into(), source, &externs).unwrap();
        let generated = generate(&class, &Vec::<ClassDefinition>::new(), &externs).unwrap();
        let program = assemble(&generated.assembly, generated.symbol_count, &externs).unwrap();
        (class, program)
    }

    fn compile(units: &[InitializerUnit]) -> InitializerCompilation {
        InterpretedBackend::new(Arc::new(ExternRegistry::standard())).compile(
            "init0",
            units,
            &Vec::<ClassDefinition>::new(),
        )
    }

    fn unit_of(index: usize, class: &ClassDefinition) -> InitializerUnit {
        let fields: Vec<_> = class.fields_with_initializers().cloned().collect();
        synthesize(index, class, &fields)
    }

    #[test]
    fn test_runs_initializers_into_heap() {
        let (class, mut program) = module(
            r#"
using Math;
behaviour Door {
    const int SIDE = 4;
    public int area = SIDE * SIDE;
    public int speed = max(3, SIDE);
    public float ratio = SIDE / 2;
    public int[] ids = new int[3];
}
"#,
        );
        let unit = unit_of(0, &class);
        let compilation = compile(std::slice::from_ref(&unit));
        assert_eq!(compilation.error_count(), 0, "{:?}", compilation.diagnostics);

        let bridge = HeapBridge::new();
        let assembly = compilation.assembly.unwrap();
        assert_eq!(assembly.id(), "init0");
        assembly.invoke(&unit.class_name, &mut program, &bridge).unwrap();

        assert_eq!(program.get_variable("area"), Some(&Value::Int(16)));
        assert_eq!(program.get_variable("speed"), Some(&Value::Int(4)));
        assert_eq!(program.get_variable("ratio"), Some(&Value::Float(2.0)));
        assert_eq!(
            program.get_variable("ids"),
            Some(&Value::array_of_len(ValueType::Int, 3))
        );
        assert_eq!(bridge.writes(), 4);
    }

    #[test]
    fn test_error_positions_point_into_unit() {
        let (class, _) = module("behaviour Door { public int a = 1 + 1; }");
        let mut unit = unit_of(0, &class);
        unit.source = unit.source.replace("1 + 1", "1 + \"x\"");

        let compilation = compile(&[unit]);
        assert!(compilation.assembly.is_none());
        let errors: Vec<_> = compilation.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].unit, 0);
        // `int a = ...` is the first statement of `__init`
        assert_eq!(errors[0].position.line, 2);
        assert!(errors[0].code.is_some());
    }

    #[test]
    fn test_one_bad_unit_fails_whole_batch() {
        let (good, _) = module("behaviour Door { public int a = 2 * 3; }");
        let (bad, _) = module("behaviour Door { public int b = 2 * 3; }");
        let mut broken = unit_of(1, &bad);
        broken.source = broken.source.replace("2 * 3", "2 * true");

        let compilation = compile(&[unit_of(0, &good), broken]);
        assert!(compilation.assembly.is_none());
        assert!(compilation.errors().all(|d| d.unit == 1));
    }

    #[test]
    fn test_unused_using_is_a_warning() {
        let (class, _) = module("using Math;\nbehaviour Door { public int a = 2 * 3; }");
        let compilation = compile(&[unit_of(0, &class)]);
        assert_eq!(compilation.error_count(), 0);
        assert_eq!(compilation.diagnostics.len(), 1);
        assert_eq!(compilation.diagnostics[0].severity, Severity::Warning);
        assert!(compilation.assembly.is_some());
    }

    #[test]
    fn test_store_into_unknown_symbol_is_rejected() {
        let (class, _) = module("behaviour Door { public int a = 2 * 3; }");
        let mut unit = unit_of(0, &class);
        unit.source = unit.source.replace("program.store(\"a\"", "program.store(\"missing\"");

        let compilation = compile(&[unit]);
        assert_eq!(compilation.error_count(), 1);
        assert!(compilation.diagnostics[0].message.contains("missing"));
    }

    #[test]
    fn test_runtime_fault_is_reported() {
        let (class, mut program) = module("behaviour Door { public int a = 0; public int b = 10 / a; }");
        let unit = unit_of(0, &class);
        let assembly = compile(std::slice::from_ref(&unit)).assembly.unwrap();
        let fault = assembly
            .invoke(&unit.class_name, &mut program, &HeapBridge::new())
            .unwrap_err();
        assert_eq!(fault, InitializerFault::Extern(ExternError::DivideByZero));
    }

    #[test]
    fn test_oversized_array_is_a_fault() {
        let (class, mut program) = module("behaviour Door { public int[] a = new int[9223372036854775807]; }");
        let unit = unit_of(0, &class);
        let assembly = compile(std::slice::from_ref(&unit)).assembly.unwrap();
        let fault = assembly
            .invoke(&unit.class_name, &mut program, &HeapBridge::new())
            .unwrap_err();
        assert!(matches!(
            fault,
            InitializerFault::Extern(ExternError::ArrayTooLarge { size: i64::MAX, .. })
        ));
        assert_eq!(program.get_variable("a"), None);
    }

    #[test]
    fn test_fields_named_like_unit_internals() {
        let (class, mut program) = module(
            "behaviour Door { public int init = 3; public int program = init * 2; public int store = program + 1; }",
        );
        let unit = unit_of(0, &class);
        let compilation = compile(std::slice::from_ref(&unit));
        assert_eq!(compilation.error_count(), 0, "{:?}", compilation.diagnostics);

        let assembly = compilation.assembly.unwrap();
        assembly
            .invoke(&unit.class_name, &mut program, &HeapBridge::new())
            .unwrap();
        assert_eq!(program.get_variable("program"), Some(&Value::Int(6)));
        assert_eq!(program.get_variable("store"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_missing_entry() {
        let (class, mut program) = module("behaviour Door { public int a = 2 * 3; }");
        let assembly = compile(&[unit_of(0, &class)]).assembly.unwrap();
        let fault = assembly
            .invoke("Initializer9", &mut program, &HeapBridge::new())
            .unwrap_err();
        assert!(matches!(fault, InitializerFault::MissingEntry(name) if name == "Initializer9"));
    }
}
