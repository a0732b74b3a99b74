//! Typed heap stores used by initializer routines

use std::sync::atomic::{AtomicUsize, Ordering};

use vesper_ast::{Value, ValueCategory, ValueType};
use vesper_vm::{HeapError, Program};

/// How an initializer value reaches the heap, decided when the
/// initializer batch is compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRoute {
    /// Stored as-is into a slot of the field's type
    Direct(ValueCategory),
    /// Jagged arrays: outer array re-typed to `object[]` first
    Serialized,
}

impl StoreRoute {
    pub fn for_type(ty: &ValueType) -> Self {
        if ty.is_heap_storable() {
            StoreRoute::Direct(ty.category())
        } else {
            StoreRoute::Serialized
        }
    }
}

/// Heap write handle passed to initializer routines
#[derive(Debug, Default)]
pub struct HeapBridge {
    writes: AtomicUsize,
}

impl HeapBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` into the heap variable `symbol` declared as `ty`
    pub fn store(
        &self,
        program: &mut Program,
        symbol: &str,
        ty: &ValueType,
        route: &StoreRoute,
        value: Value,
    ) -> Result<(), HeapError> {
        match route {
            StoreRoute::Direct(ValueCategory::Primitive) | StoreRoute::Direct(ValueCategory::String) => {
                program.set_variable(symbol, value, ty)?
            }
            StoreRoute::Direct(ValueCategory::Array) => {
                let value = match value {
                    // `null` arrays are stored as absent
                    Value::Null => Value::Null,
                    Value::Array { items, .. } => Value::Array {
                        element: ty.element().cloned().unwrap_or(ValueType::Object),
                        items,
                    },
                    other => other,
                };
                program.set_variable(symbol, value, ty)?
            }
            // Checked after the routine ran; the value stays either way
            StoreRoute::Direct(ValueCategory::Composite) => program.set_variable(symbol, value, ty)?,
            StoreRoute::Serialized => program.set_variable(symbol, serialize(value), &serialized_type())?,
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of successful stores so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

fn serialized_type() -> ValueType {
    ValueType::array_of(ValueType::Object)
}

fn serialize(value: Value) -> Value {
    match value {
        Value::Array { items, .. } => Value::Array {
            element: ValueType::Object,
            items,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_vm::{assemble, ExternRegistry};

    fn program() -> Program {
        let text = ".data_start\n    speed: %Float, null\n    grid: %Object[], null\n.data_end\n.code_start\n.code_end\n";
        assemble(text, 2, &ExternRegistry::standard()).unwrap()
    }

    #[test]
    fn test_routes_by_type() {
        assert_eq!(
            StoreRoute::for_type(&ValueType::Int),
            StoreRoute::Direct(ValueCategory::Primitive)
        );
        assert_eq!(
            StoreRoute::for_type(&ValueType::from_name("int", 1)),
            StoreRoute::Direct(ValueCategory::Array)
        );
        assert_eq!(
            StoreRoute::for_type(&ValueType::from_name("int", 2)),
            StoreRoute::Serialized
        );
    }

    #[test]
    fn test_direct_store_widens_into_float() {
        let mut program = program();
        let bridge = HeapBridge::new();
        bridge
            .store(
                &mut program,
                "speed",
                &ValueType::Float,
                &StoreRoute::Direct(ValueCategory::Primitive),
                Value::Int(3),
            )
            .unwrap();
        assert_eq!(program.get_variable("speed"), Some(&Value::Float(3.0)));
        assert_eq!(bridge.writes(), 1);
    }

    #[test]
    fn test_serialized_store_of_jagged_array() {
        let mut program = program();
        let ty = ValueType::from_name("int", 2);
        let inner = Value::Array {
            element: ValueType::Int,
            items: vec![Value::Int(1)],
        };
        let value = Value::Array {
            element: ValueType::from_name("int", 1),
            items: vec![inner.clone(), Value::Null],
        };

        HeapBridge::new()
            .store(&mut program, "grid", &ty, &StoreRoute::Serialized, value)
            .unwrap();
        assert_eq!(
            program.get_variable("grid"),
            Some(&Value::Array {
                element: ValueType::Object,
                items: vec![inner, Value::Null],
            })
        );
    }

    #[test]
    fn test_unknown_symbol_is_heap_error() {
        let mut program = program();
        let err = HeapBridge::new()
            .store(
                &mut program,
                "missing",
                &ValueType::Int,
                &StoreRoute::Direct(ValueCategory::Primitive),
                Value::Int(1),
            )
            .unwrap_err();
        assert_eq!(err, HeapError::UnknownSymbol("missing".into()));
    }
}
