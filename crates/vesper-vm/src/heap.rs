//! Program heap: typed slots addressed by symbol address

use vesper_ast::{Value, ValueType};

use crate::HeapError;

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    ty: ValueType,
    value: Option<Value>,
}

/// Addressable storage of one program
///
/// A slot holding `null` and a slot never written are the same thing:
/// [`Heap::get`] returns `None` for both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heap {
    slots: Vec<Slot>,
}

impl Heap {
    /// Empty heap with one unset slot per declared type
    pub fn new(types: impl IntoIterator<Item = ValueType>) -> Self {
        Self {
            slots: types
                .into_iter()
                .map(|ty| Slot { ty, value: None })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, address: u32) -> Option<&Value> {
        self.slots
            .get(address as usize)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Declared type of the slot at `address`
    pub fn get_type(&self, address: u32) -> Option<&ValueType> {
        self.slots.get(address as usize).map(|slot| &slot.ty)
    }

    /// Store `value` at `address`, retyping the slot to `ty`
    ///
    /// Integers stored into float slots are widened.
    pub fn set(&mut self, address: u32, value: Value, ty: &ValueType) -> Result<(), HeapError> {
        let size = self.slots.len();
        let slot = self
            .slots
            .get_mut(address as usize)
            .ok_or(HeapError::AddressOutOfRange { address, size })?;

        let found = value.value_type();
        if !ty.accepts(&found) {
            return Err(HeapError::TypeMismatch {
                expected: ty.clone(),
                found,
            });
        }

        slot.ty = ty.clone();
        slot.value = match value {
            Value::Null => None,
            Value::Int(n) if *ty == ValueType::Float => Some(Value::Float(n as f64)),
            other => Some(other),
        };
        Ok(())
    }

    pub fn clear(&mut self, address: u32) {
        if let Some(slot) = self.slots.get_mut(address as usize) {
            slot.value = None;
        }
    }

    /// Addresses currently holding a value
    pub fn occupied(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|v| (i as u32, v)))
    }
}
