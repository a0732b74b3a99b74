//! Heap values

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValueType;

/// A value that can live in a program heap slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array {
        element: ValueType,
        items: Vec<Value>,
    },
    /// Instance of a user-declared behaviour type
    Object {
        class: String,
        fields: BTreeMap<String, Value>,
    },
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Zero-length array of the given element type
    pub fn empty_array(element: ValueType) -> Self {
        Value::Array {
            element,
            items: Vec::new(),
        }
    }

    /// Array of `len` default elements
    pub fn array_of_len(element: ValueType, len: usize) -> Self {
        let items = vec![Value::default_for(&element); len];
        Value::Array { element, items }
    }

    /// Default value a fresh slot of type `ty` holds inside an array
    pub fn default_for(ty: &ValueType) -> Self {
        match ty {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            _ => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Instance of a user-declared composite type
    pub fn is_user_defined(&self) -> bool {
        match self {
            Value::Object { .. } => true,
            Value::Array { element, .. } => element.is_user_defined(),
            _ => false,
        }
    }

    /// Runtime type of the value; `null` reports `object`
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Object,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::String,
            Value::Array { element, .. } => ValueType::array_of(element.clone()),
            Value::Object { class, .. } => ValueType::User(class.clone()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Text used in literals inside generated source and assembly
    pub fn literal_text(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{:.1}", f),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array { element, items } => write!(f, "{}[{}]", element, items.len()),
            Value::Object { class, .. } => write!(f, "{}", class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_defined_detection() {
        let obj = Value::Object {
            class: "Door".into(),
            fields: BTreeMap::new(),
        };
        assert!(obj.is_user_defined());
        assert!(Value::empty_array(ValueType::User("Door".into())).is_user_defined());
        assert!(!Value::Int(3).is_user_defined());
    }

    #[test]
    fn test_array_of_len_uses_element_defaults() {
        let arr = Value::array_of_len(ValueType::Int, 2);
        assert_eq!(
            arr,
            Value::Array {
                element: ValueType::Int,
                items: vec![Value::Int(0), Value::Int(0)]
            }
        );
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(Value::string("a\"b").literal_text(), "\"a\\\"b\"");
        assert_eq!(Value::Float(2.0).literal_text(), "2.0");
        assert_eq!(Value::Int(-4).literal_text(), "-4");
    }
}
