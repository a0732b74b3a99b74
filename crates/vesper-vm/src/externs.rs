//! Library externs available to programs
//!
//! Every extern has a unique id of the form
//! `Namespace.name__Param_Param__Ret`, which is what assembly text names
//! in `EXTERN` instructions. Source code reaches externs by namespace and
//! name; [`ExternRegistry::resolve`] picks the overload.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use vesper_ast::{BinaryOp, UnaryOp, Value, ValueType};

use crate::{ops, ExternError};

pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, ExternError> + Send + Sync>;

#[derive(Clone)]
pub struct ExternFunction {
    pub namespace: String,
    pub name: String,
    pub params: Vec<ValueType>,
    /// `None` for externs returning nothing
    pub ret: Option<ValueType>,
    native: NativeFn,
}

impl ExternFunction {
    pub fn id(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.assembly_name()).collect();
        let ret = self
            .ret
            .as_ref()
            .map(|r| r.assembly_name())
            .unwrap_or_else(|| "Void".to_string());
        format!("{}.{}__{}__{}", self.namespace, self.name, params.join("_"), ret)
    }

    pub fn accepts(&self, args: &[ValueType]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(p, a)| p.accepts(a))
    }

    fn is_exact(&self, args: &[ValueType]) -> bool {
        self.params.len() == args.len() && self.params.iter().zip(args).all(|(p, a)| p == a)
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, ExternError> {
        if args.len() != self.params.len() {
            return Err(ExternError::InvalidArguments(self.id()));
        }
        (self.native)(args)
    }
}

impl fmt::Debug for ExternFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternFunction").field("id", &self.id()).finish()
    }
}

/// Loaded library references
#[derive(Debug, Clone, Default)]
pub struct ExternRegistry {
    functions: BTreeMap<String, ExternFunction>,
    overloads: BTreeMap<(String, String), Vec<String>>,
}

impl ExternRegistry {
    /// Registry with no externs at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Operators, array/string intrinsics and the `Math`, `Strings` and
    /// `Arrays` libraries
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_operators();
        registry.register_intrinsics();
        registry.register_math();
        registry.register_strings();
        registry.register_arrays();
        registry
    }

    pub fn register<F>(
        &mut self,
        namespace: &str,
        name: &str,
        params: Vec<ValueType>,
        ret: Option<ValueType>,
        native: F,
    ) -> String
    where
        F: Fn(&[Value]) -> Result<Value, ExternError> + Send + Sync + 'static,
    {
        let function = ExternFunction {
            namespace: namespace.to_string(),
            name: name.to_string(),
            params,
            ret,
            native: Arc::new(native),
        };
        let id = function.id();
        self.overloads
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .push(id.clone());
        self.functions.insert(id.clone(), function);
        id
    }

    pub fn get(&self, id: &str) -> Option<&ExternFunction> {
        self.functions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.overloads.keys().any(|(ns, _)| ns == namespace)
    }

    pub fn has_function(&self, namespace: &str, name: &str) -> bool {
        self.overloads
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self.overloads.keys().map(|(ns, _)| ns.as_str()).collect();
        namespaces.dedup();
        namespaces
    }

    /// Pick the overload of `namespace.name` for the argument types,
    /// preferring an exact match over one needing conversions
    pub fn resolve(&self, namespace: &str, name: &str, args: &[ValueType]) -> Option<&ExternFunction> {
        let ids = self
            .overloads
            .get(&(namespace.to_string(), name.to_string()))?;
        let candidates: Vec<&ExternFunction> =
            ids.iter().filter_map(|id| self.functions.get(id)).collect();

        candidates
            .iter()
            .find(|f| f.is_exact(args))
            .or_else(|| candidates.iter().find(|f| f.accepts(args)))
            .copied()
    }

    fn register_operators(&mut self) {
        use BinaryOp::*;

        let arith = [Add, Sub, Mul, Div, Rem];
        let compare = [Lt, LtEq, Gt, GtEq, Eq, NotEq];

        for (ns, ty) in [("Int", ValueType::Int), ("Float", ValueType::Float)] {
            for op in arith {
                self.register_binary(ns, op, ty.clone(), ty.clone());
            }
            for op in compare {
                self.register_binary(ns, op, ty.clone(), ValueType::Bool);
            }
            self.register_unary(ns, UnaryOp::Neg, ty.clone());
        }

        for op in [And, Or, Eq, NotEq] {
            self.register_binary("Bool", op, ValueType::Bool, ValueType::Bool);
        }
        self.register_unary("Bool", UnaryOp::Not, ValueType::Bool);

        self.register_binary("String", Add, ValueType::Object, ValueType::String);
        for ns in ["String", "Object"] {
            for op in [Eq, NotEq] {
                self.register_binary(ns, op, ValueType::Object, ValueType::Bool);
            }
        }
    }

    fn register_binary(&mut self, ns: &str, op: BinaryOp, operand: ValueType, ret: ValueType) {
        self.register(
            ns,
            op.extern_name(),
            vec![operand.clone(), operand],
            Some(ret),
            move |args| ops::binary(op, &args[0], &args[1]),
        );
    }

    fn register_unary(&mut self, ns: &str, op: UnaryOp, operand: ValueType) {
        self.register(
            ns,
            op.extern_name(),
            vec![operand.clone()],
            Some(operand),
            move |args| ops::unary(op, &args[0]),
        );
    }

    fn register_intrinsics(&mut self) {
        use ValueType::{Int, Object};

        self.register("Array", "ctor", vec![Int], Some(Object), |args| {
            let len = ops::array_len(int_arg(&args[0])?)?;
            Ok(Value::array_of_len(ValueType::Object, len))
        });
        self.register("Array", "get", vec![Object, Int], Some(Object), |args| {
            let (items, index) = array_slot(&args[0], &args[1])?;
            Ok(items[index].clone())
        });
        self.register("Array", "set", vec![Object, Int, Object], None, |args| {
            // Arrays are values here; the write is visible only to the caller
            array_slot(&args[0], &args[1])?;
            Ok(Value::Null)
        });
        self.register("Array", "length", vec![Object], Some(Int), |args| match &args[0] {
            Value::Array { items, .. } => Ok(Value::Int(items.len() as i64)),
            Value::Null => Err(ExternError::NullReference),
            _ => Err(ExternError::InvalidArguments("Array.length".into())),
        });
        self.register("String", "length", vec![ValueType::String], Some(Int), |args| {
            Ok(Value::Int(str_arg(&args[0])?.chars().count() as i64))
        });
        self.register("Behaviour", "send", vec![Object, ValueType::String], None, |args| {
            if args[0].is_null() {
                return Err(ExternError::NullReference);
            }
            Ok(Value::Null)
        });
        self.register("Behaviour", "get", vec![Object, ValueType::String], Some(Object), |args| {
            let name = str_arg(&args[1])?;
            match &args[0] {
                Value::Object { fields, .. } => Ok(fields.get(name).cloned().unwrap_or(Value::Null)),
                Value::Null => Err(ExternError::NullReference),
                _ => Err(ExternError::InvalidArguments("Behaviour.get".into())),
            }
        });
    }

    fn register_math(&mut self) {
        use ValueType::{Float, Int};

        self.register("Math", "abs", vec![Int], Some(Int), |args| {
            int_arg(&args[0])?
                .checked_abs()
                .map(Value::Int)
                .ok_or(ExternError::Overflow)
        });
        self.register("Math", "abs", vec![Float], Some(Float), |args| {
            Ok(Value::Float(float_arg(&args[0])?.abs()))
        });
        self.register("Math", "min", vec![Int, Int], Some(Int), |args| {
            Ok(Value::Int(int_arg(&args[0])?.min(int_arg(&args[1])?)))
        });
        self.register("Math", "min", vec![Float, Float], Some(Float), |args| {
            Ok(Value::Float(float_arg(&args[0])?.min(float_arg(&args[1])?)))
        });
        self.register("Math", "max", vec![Int, Int], Some(Int), |args| {
            Ok(Value::Int(int_arg(&args[0])?.max(int_arg(&args[1])?)))
        });
        self.register("Math", "max", vec![Float, Float], Some(Float), |args| {
            Ok(Value::Float(float_arg(&args[0])?.max(float_arg(&args[1])?)))
        });
        self.register("Math", "clamp", vec![Int, Int, Int], Some(Int), |args| {
            let (v, lo, hi) = (int_arg(&args[0])?, int_arg(&args[1])?, int_arg(&args[2])?);
            if lo > hi {
                return Err(ExternError::InvalidArguments("Math.clamp".into()));
            }
            Ok(Value::Int(v.clamp(lo, hi)))
        });
        self.register("Math", "clamp", vec![Float, Float, Float], Some(Float), |args| {
            let (v, lo, hi) = (float_arg(&args[0])?, float_arg(&args[1])?, float_arg(&args[2])?);
            if !(lo <= hi) {
                return Err(ExternError::InvalidArguments("Math.clamp".into()));
            }
            Ok(Value::Float(v.clamp(lo, hi)))
        });
        self.register("Math", "floor", vec![Float], Some(Int), |args| {
            let f = float_arg(&args[0])?.floor();
            if !f.is_finite() || f < i64::MIN as f64 || f > i64::MAX as f64 {
                return Err(ExternError::Overflow);
            }
            Ok(Value::Int(f as i64))
        });
        self.register("Math", "sqrt", vec![Float], Some(Float), |args| {
            Ok(Value::Float(float_arg(&args[0])?.sqrt()))
        });
        self.register("Math", "pow", vec![Float, Float], Some(Float), |args| {
            Ok(Value::Float(float_arg(&args[0])?.powf(float_arg(&args[1])?)))
        });
    }

    fn register_strings(&mut self) {
        use ValueType::{Int, String};

        self.register("Strings", "concat", vec![String, String], Some(String), |args| {
            Ok(Value::Str(format!("{}{}", str_arg(&args[0])?, str_arg(&args[1])?)))
        });
        self.register("Strings", "repeat", vec![String, Int], Some(String), |args| {
            let count = int_arg(&args[1])?;
            let count = usize::try_from(count)
                .map_err(|_| ExternError::InvalidArguments("Strings.repeat".into()))?;
            Ok(Value::Str(str_arg(&args[0])?.repeat(count)))
        });
        self.register("Strings", "upper", vec![String], Some(String), |args| {
            Ok(Value::Str(str_arg(&args[0])?.to_uppercase()))
        });
        self.register("Strings", "lower", vec![String], Some(String), |args| {
            Ok(Value::Str(str_arg(&args[0])?.to_lowercase()))
        });
        self.register("Strings", "length", vec![String], Some(Int), |args| {
            Ok(Value::Int(str_arg(&args[0])?.chars().count() as i64))
        });
    }

    fn register_arrays(&mut self) {
        use ValueType::Int;
        let int_array = ValueType::array_of(Int);

        self.register("Arrays", "range", vec![Int], Some(int_array.clone()), |args| {
            let n = int_arg(&args[0])?;
            ops::array_len(n)?;
            Ok(Value::Array {
                element: ValueType::Int,
                items: (0..n).map(Value::Int).collect(),
            })
        });
        self.register("Arrays", "sum", vec![int_array], Some(Int), |args| match &args[0] {
            Value::Array { items, .. } => items
                .iter()
                .try_fold(0i64, |acc, v| acc.checked_add(int_arg(v)?).ok_or(ExternError::Overflow))
                .map(Value::Int),
            Value::Null => Err(ExternError::NullReference),
            _ => Err(ExternError::InvalidArguments("Arrays.sum".into())),
        });
    }
}

fn int_arg(value: &Value) -> Result<i64, ExternError> {
    value
        .as_int()
        .ok_or_else(|| ExternError::InvalidArguments(format!("expected int, found {}", value)))
}

fn float_arg(value: &Value) -> Result<f64, ExternError> {
    value
        .as_float()
        .ok_or_else(|| ExternError::InvalidArguments(format!("expected float, found {}", value)))
}

fn str_arg(value: &Value) -> Result<&str, ExternError> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Null => Err(ExternError::NullReference),
        other => Err(ExternError::InvalidArguments(format!("expected string, found {}", other))),
    }
}

fn array_slot<'a>(array: &'a Value, index: &Value) -> Result<(&'a [Value], usize), ExternError> {
    let items = match array {
        Value::Array { items, .. } => items,
        Value::Null => return Err(ExternError::NullReference),
        _ => return Err(ExternError::InvalidArguments("array access".into())),
    };
    let index = int_arg(index)?;
    match usize::try_from(index) {
        Ok(i) if i < items.len() => Ok((items, i)),
        _ => Err(ExternError::IndexOutOfRange {
            index,
            length: items.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extern_ids() {
        let registry = ExternRegistry::standard();
        let max = registry
            .resolve("Math", "max", &[ValueType::Int, ValueType::Int])
            .unwrap();
        assert_eq!(max.id(), "Math.max__Int_Int__Int");
        assert!(registry.contains("Array.set__Object_Int_Object__Void"));
    }

    #[test]
    fn test_overload_resolution_prefers_exact() {
        let registry = ExternRegistry::standard();
        let f = registry
            .resolve("Math", "max", &[ValueType::Int, ValueType::Float])
            .unwrap();
        assert_eq!(f.ret, Some(ValueType::Float));
        assert!(registry.resolve("Math", "max", &[ValueType::String]).is_none());
        assert!(registry.resolve("Math", "nope", &[]).is_none());
    }

    #[test]
    fn test_invoke_natives() {
        let registry = ExternRegistry::standard();
        let range = registry.resolve("Arrays", "range", &[ValueType::Int]).unwrap();
        let value = range.invoke(&[Value::Int(3)]).unwrap();
        let sum = registry
            .resolve("Arrays", "sum", &[value.value_type()])
            .unwrap();
        assert_eq!(sum.invoke(&[value]), Ok(Value::Int(3)));

        let repeat = registry
            .resolve("Strings", "repeat", &[ValueType::String, ValueType::Int])
            .unwrap();
        assert_eq!(
            repeat.invoke(&[Value::string("ab"), Value::Int(2)]),
            Ok(Value::string("abab"))
        );
    }

    #[test]
    fn test_namespaces() {
        let registry = ExternRegistry::standard();
        assert!(registry.has_namespace("Math"));
        assert!(registry.has_function("Strings", "upper"));
        assert!(!registry.has_namespace("Physics"));
        assert!(ExternRegistry::new().is_empty());
    }
}
