//! Declarations: source files, behaviours, fields and methods

use serde::{Deserialize, Serialize};

use crate::{Block, Expr, Span, ValueType};

/// One parsed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Symbols defined by `#define` lines (after preprocessing)
    pub defines: Vec<String>,
    pub usings: Vec<UsingDecl>,
    pub item: ClassItem,
}

/// `using Math;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsingDecl {
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// `behaviour Door { ... }`
    Behaviour,
    /// `initializer Initializer0 { ... }`, synthesized for field initializers
    Initializer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassItem {
    pub kind: ItemKind,
    pub name: String,
    pub members: Vec<Member>,
    pub span: Span,
}

impl ClassItem {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(f) => Some(f),
            Member::Method(_) => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(m) => Some(m),
            Member::Field(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

/// `[synced(linear)]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub arg: Option<String>,
    pub span: Span,
}

/// `public int a = 1, b;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub attributes: Vec<Attribute>,
    pub visibility: Option<Visibility>,
    pub is_const: bool,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub span: Span,
}

impl FieldDecl {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDeclarator {
    pub name: String,
    pub initializer: Option<Initializer>,
    pub span: Span,
}

/// An initializer expression with its verbatim source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initializer {
    pub expr: Expr,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub visibility: Option<Visibility>,
    pub body: Block,
    pub span: Span,
}

/// A written type: base name plus array rank
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub rank: usize,
    pub span: Span,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, rank: usize, span: Span) -> Self {
        Self {
            name: name.into(),
            rank,
            span,
        }
    }

    pub fn resolve(&self) -> ValueType {
        ValueType::from_name(&self.name, self.rank)
    }

    /// Element type reference of an array type
    pub fn element(&self) -> TypeRef {
        Self {
            name: self.name.clone(),
            rank: self.rank.saturating_sub(1),
            span: self.span,
        }
    }
}
