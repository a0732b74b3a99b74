//! Language-level value types

use std::fmt;

use serde::{Deserialize, Serialize};

/// The type of a storage location or value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    /// Untyped slot; also the type of `null`
    Object,
    Array(Box<ValueType>),
    /// A user-declared behaviour type
    User(String),
}

/// Coarse grouping used to pick heap store routines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueCategory {
    Primitive,
    String,
    Array,
    Composite,
}

impl ValueType {
    /// Resolve a source-level type name with `rank` trailing `[]`
    pub fn from_name(name: &str, rank: usize) -> Self {
        let mut ty = match name {
            "bool" => ValueType::Bool,
            "int" => ValueType::Int,
            "float" => ValueType::Float,
            "string" => ValueType::String,
            "object" => ValueType::Object,
            other => ValueType::User(other.to_string()),
        };
        for _ in 0..rank {
            ty = ValueType::array_of(ty);
        }
        ty
    }

    pub fn array_of(element: ValueType) -> Self {
        ValueType::Array(Box::new(element))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::Array(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ValueType::String)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    pub fn element(&self) -> Option<&ValueType> {
        match self {
            ValueType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Array whose elements are themselves arrays
    pub fn is_jagged(&self) -> bool {
        matches!(self, ValueType::Array(elem) if elem.is_array())
    }

    /// Whether the type contains a user-declared type anywhere
    pub fn is_user_defined(&self) -> bool {
        match self {
            ValueType::User(_) => true,
            ValueType::Array(elem) => elem.is_user_defined(),
            _ => false,
        }
    }

    /// Jagged arrays cannot be written to the heap as-is
    pub fn is_heap_storable(&self) -> bool {
        !self.is_jagged()
    }

    /// Whether a value may hold `null`
    pub fn is_nullable(&self) -> bool {
        !matches!(self, ValueType::Bool | ValueType::Int | ValueType::Float)
    }

    pub fn category(&self) -> ValueCategory {
        match self {
            ValueType::Bool | ValueType::Int | ValueType::Float => ValueCategory::Primitive,
            ValueType::String => ValueCategory::String,
            ValueType::Array(_) => ValueCategory::Array,
            ValueType::Object | ValueType::User(_) => ValueCategory::Composite,
        }
    }

    /// Whether a value of type `from` can be stored in a slot of this type
    pub fn accepts(&self, from: &ValueType) -> bool {
        if self == from {
            return true;
        }
        match (self, from) {
            (ValueType::Float, ValueType::Int) => true,
            // `null` literal
            (to, ValueType::Object) => to.is_nullable(),
            (ValueType::Object, _) => true,
            _ => false,
        }
    }

    /// Name used in assembly data declarations
    pub fn assembly_name(&self) -> String {
        match self {
            ValueType::Bool => "Bool".to_string(),
            ValueType::Int => "Int".to_string(),
            ValueType::Float => "Float".to_string(),
            ValueType::String => "String".to_string(),
            ValueType::Object => "Object".to_string(),
            ValueType::Array(elem) => format!("{}[]", elem.assembly_name()),
            ValueType::User(name) => format!("@{}", name),
        }
    }

    /// Inverse of [`ValueType::assembly_name`]
    pub fn from_assembly_name(name: &str) -> Option<Self> {
        if let Some(inner) = name.strip_suffix("[]") {
            return Self::from_assembly_name(inner).map(ValueType::array_of);
        }
        match name {
            "Bool" => Some(ValueType::Bool),
            "Int" => Some(ValueType::Int),
            "Float" => Some(ValueType::Float),
            "String" => Some(ValueType::String),
            "Object" => Some(ValueType::Object),
            _ => {
                let user = name.strip_prefix('@')?;
                let valid = !user.is_empty()
                    && user.chars().all(|c| c.is_alphanumeric() || c == '_');
                valid.then(|| ValueType::User(user.to_string()))
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
            ValueType::Object => write!(f, "object"),
            ValueType::Array(elem) => write!(f, "{}[]", elem),
            ValueType::User(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_with_rank() {
        let ty = ValueType::from_name("int", 2);
        assert!(ty.is_jagged());
        assert!(!ty.is_heap_storable());
        assert_eq!(ty.to_string(), "int[][]");
    }

    #[test]
    fn test_assembly_names_round_trip_user_arrays() {
        let ty = ValueType::array_of(ValueType::User("Door".into()));
        assert_eq!(ty.assembly_name(), "@Door[]");
        assert_eq!(ValueType::from_assembly_name("@Door[]"), Some(ty));
        assert_eq!(ValueType::from_assembly_name("Nope"), None);
    }

    #[test]
    fn test_accepts_widening_and_null() {
        assert!(ValueType::Float.accepts(&ValueType::Int));
        assert!(!ValueType::Int.accepts(&ValueType::Float));
        assert!(ValueType::String.accepts(&ValueType::Object));
        assert!(!ValueType::Int.accepts(&ValueType::Object));
    }
}
