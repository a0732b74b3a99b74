//! Bound class definitions

use std::collections::BTreeSet;

use vesper_ast::{ItemKind, ScriptRef, Span, ValueType};

use crate::{BoundExpr, BoundMethod, SymbolDefinition, SymbolId, SymbolTable};

/// Import context of one module, carried into anything synthesized from it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverContext {
    /// `using` namespaces in declaration order
    pub usings: Vec<String>,
    /// Namespaces actually referenced through a `using`
    pub used: BTreeSet<String>,
}

impl ResolverContext {
    pub fn unused(&self) -> impl Iterator<Item = &str> {
        self.usings
            .iter()
            .filter(|u| !self.used.contains(*u))
            .map(String::as_str)
    }
}

/// Initializer expression of a field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInitializer {
    /// Verbatim source text of the expression
    pub text: String,
    pub expr: BoundExpr,
    /// Whether the value was folded into the symbol's default
    pub is_literal: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub symbol: SymbolId,
    pub name: String,
    pub declared_type: ValueType,
    pub is_const: bool,
    pub is_public: bool,
    pub initializer: Option<FieldInitializer>,
    pub span: Span,
}

impl FieldDefinition {
    /// Has an initializer that must be evaluated rather than folded
    pub fn needs_evaluation(&self) -> bool {
        self.initializer.as_ref().is_some_and(|i| !i.is_literal)
    }
}

/// Bound, resolved representation of one module
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    pub name: String,
    pub kind: ItemKind,
    pub script: ScriptRef,
    pub symbols: SymbolTable,
    pub fields: Vec<FieldDefinition>,
    pub methods: Vec<BoundMethod>,
    pub resolver: ResolverContext,
    pub span: Span,
}

impl ClassDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&BoundMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&SymbolDefinition> {
        self.symbols.get(id)
    }

    /// Fields whose initializer is not a compile-time literal
    pub fn fields_with_initializers(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.needs_evaluation())
    }
}

/// Lookup of behaviour classes by name, for cross-module references
pub trait ClassLookup {
    fn class(&self, name: &str) -> Option<&ClassDefinition>;
}

impl ClassLookup for [ClassDefinition] {
    fn class(&self, name: &str) -> Option<&ClassDefinition> {
        self.iter().find(|c| c.name == name)
    }
}

impl ClassLookup for Vec<ClassDefinition> {
    fn class(&self, name: &str) -> Option<&ClassDefinition> {
        self.as_slice().class(name)
    }
}
