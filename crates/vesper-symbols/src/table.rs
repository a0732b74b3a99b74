//! Scoped symbol table
//!
//! Every symbol lives in one flat arena and keeps its slot for the
//! lifetime of the table; scopes only control name visibility. The
//! arena order is the heap layout the code generator emits.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use vesper_ast::{Value, ValueType};
use vesper_vm::SyncMode;

use crate::SymbolError;

/// Index of a symbol in its table's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// Declaration flags of a symbol
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeclFlags(u8);

impl DeclFlags {
    pub const NONE: DeclFlags = DeclFlags(0);
    pub const PUBLIC: DeclFlags = DeclFlags(1);
    pub const PRIVATE: DeclFlags = DeclFlags(1 << 1);
    pub const CONST: DeclFlags = DeclFlags(1 << 2);
    pub const FIELD: DeclFlags = DeclFlags(1 << 3);
    pub const LOCAL: DeclFlags = DeclFlags(1 << 4);
    /// Compiler-synthesized: interned constants and temporaries
    pub const INTERNAL: DeclFlags = DeclFlags(1 << 5);

    pub fn contains(self, other: DeclFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_public(self) -> bool {
        self.contains(DeclFlags::PUBLIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(DeclFlags::PRIVATE)
    }

    pub fn is_const(self) -> bool {
        self.contains(DeclFlags::CONST)
    }
}

impl BitOr for DeclFlags {
    type Output = DeclFlags;

    fn bitor(self, rhs: DeclFlags) -> DeclFlags {
        DeclFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for DeclFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (DeclFlags::PUBLIC, "Public"),
            (DeclFlags::PRIVATE, "Private"),
            (DeclFlags::CONST, "Const"),
            (DeclFlags::FIELD, "Field"),
            (DeclFlags::LOCAL, "Local"),
            (DeclFlags::INTERNAL, "Internal"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "DeclFlags({})", set.join(" | "))
    }
}

/// One declared or synthesized storage location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    /// Unique across the whole program; this is the heap symbol name
    pub unique_name: String,
    pub original_name: String,
    pub flags: DeclFlags,
    pub value_type: ValueType,
    /// Compile-time literal default
    pub default_value: Option<Value>,
    pub sync_mode: SyncMode,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<SymbolDefinition>,
    /// `scopes[0]` is the class scope and is never closed
    scopes: Vec<HashMap<String, SymbolId>>,
    unique_names: HashSet<String>,
    constants: HashMap<(ValueType, String), SymbolId>,
    next_suffix: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            ..Default::default()
        }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn close_scope(&mut self) -> Result<(), SymbolError> {
        if self.scopes.len() <= 1 {
            return Err(SymbolError::Unbalanced);
        }
        self.scopes.pop();
        Ok(())
    }

    /// Run `f` inside a fresh scope; the scope is closed however `f` ends
    pub fn with_scope<R>(&mut self, f: impl FnOnce(&mut SymbolTable) -> R) -> R {
        let depth = self.scopes.len();
        self.open_scope();
        let result = f(self);
        self.scopes.truncate(depth);
        result
    }

    /// Number of currently open (non-class) scopes
    pub fn depth(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }

    pub fn is_balanced(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Declare a class field; fields keep their original name
    pub fn define_field(
        &mut self,
        name: &str,
        value_type: ValueType,
        flags: DeclFlags,
        default_value: Option<Value>,
        sync_mode: SyncMode,
    ) -> Result<SymbolId, SymbolError> {
        if self.scopes[0].contains_key(name) || self.unique_names.contains(name) {
            return Err(SymbolError::Duplicate {
                name: name.to_string(),
            });
        }
        let id = self.push(SymbolDefinition {
            unique_name: name.to_string(),
            original_name: name.to_string(),
            flags: flags | DeclFlags::FIELD,
            value_type,
            default_value,
            sync_mode,
        });
        self.scopes[0].insert(name.to_string(), id);
        Ok(id)
    }

    /// Declare a local in the innermost scope
    ///
    /// Locals may not shadow other locals of enclosing scopes.
    pub fn define_local(&mut self, name: &str, value_type: ValueType) -> Result<SymbolId, SymbolError> {
        if self.scopes[1..].iter().any(|scope| scope.contains_key(name)) {
            return Err(SymbolError::Duplicate {
                name: name.to_string(),
            });
        }
        let unique_name = self.fresh_name(&format!("__{}", name));
        let id = self.push(SymbolDefinition {
            unique_name,
            original_name: name.to_string(),
            flags: DeclFlags::LOCAL,
            value_type,
            default_value: None,
            sync_mode: SyncMode::NotSynced,
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), id);
        }
        Ok(id)
    }

    /// Interned constant holding `value`
    pub fn define_constant(&mut self, value: &Value) -> SymbolId {
        let value_type = value.value_type();
        let key = (value_type.clone(), value.literal_text());
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let unique_name = self.fresh_name(&format!("__const_{}", type_tag(&value_type)));
        let id = self.push(SymbolDefinition {
            unique_name: unique_name.clone(),
            original_name: unique_name,
            flags: DeclFlags::INTERNAL | DeclFlags::CONST,
            value_type,
            default_value: Some(value.clone()),
            sync_mode: SyncMode::NotSynced,
        });
        self.constants.insert(key, id);
        id
    }

    /// Fresh temporary of type `value_type`
    pub fn define_temporary(&mut self, value_type: ValueType) -> SymbolId {
        let unique_name = self.fresh_name(&format!("__tmp_{}", type_tag(&value_type)));
        self.push(SymbolDefinition {
            unique_name: unique_name.clone(),
            original_name: unique_name,
            flags: DeclFlags::INTERNAL,
            value_type,
            default_value: None,
            sync_mode: SyncMode::NotSynced,
        })
    }

    /// Resolve `name` from the innermost scope outward
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn get(&self, id: SymbolId) -> Option<&SymbolDefinition> {
        self.symbols.get(id.0 as usize)
    }

    pub fn by_unique_name(&self, unique_name: &str) -> Option<&SymbolDefinition> {
        self.symbols.iter().find(|s| s.unique_name == unique_name)
    }

    /// Every symbol ever declared, in heap order
    pub fn all_unique_symbols(&self) -> impl Iterator<Item = &SymbolDefinition> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn push(&mut self, symbol: SymbolDefinition) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.unique_names.insert(symbol.unique_name.clone());
        self.symbols.push(symbol);
        id
    }

    fn fresh_name(&mut self, base: &str) -> String {
        loop {
            let counter = self.next_suffix.entry(base.to_string()).or_insert(0);
            let candidate = format!("{}_{}", base, counter);
            *counter += 1;
            if !self.unique_names.contains(&candidate) {
                return candidate;
            }
        }
    }
}

/// Identifier-safe spelling of a type for synthesized names
fn type_tag(ty: &ValueType) -> String {
    ty.assembly_name().replace("[]", "Array").replace('@', "")
}
