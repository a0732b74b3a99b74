//! Per-build state of one compilation unit

use std::sync::Arc;

use vesper_ast::{DefineHeader, LinePosition, ScriptRef, Span};
use vesper_symbols::{ClassDefinition, ClassLookup, FieldDefinition, SymbolTable};

use tracing::error;

use crate::{AssetId, CompileError, ErrorKind};

/// One module taking part in a build
///
/// Created for every registered asset with readable source and dropped
/// when the build ends.
#[derive(Debug, Clone)]
pub struct Module {
    pub script: ScriptRef,
    pub asset: AssetId,
    /// User source text, without the define header
    pub source: String,
    /// Source as the binder saw it
    bound_source: Arc<str>,
    header_lines: usize,
    pub class: Option<Arc<ClassDefinition>>,
    /// Fields whose initializer must be evaluated
    pub fields_with_initializers: Vec<FieldDefinition>,
    /// Generated symbol table, set once the module compiled
    pub symbols: Option<SymbolTable>,
    pub errors: Vec<CompileError>,
}

impl Module {
    pub fn new(script: ScriptRef, asset: AssetId, source: String, header: &DefineHeader) -> Self {
        Self {
            bound_source: Arc::from(header.apply(&source)),
            header_lines: header.line_count(),
            script,
            asset,
            source,
            class: None,
            fields_with_initializers: Vec::new(),
            symbols: None,
            errors: Vec::new(),
        }
    }

    pub fn bound_source(&self) -> Arc<str> {
        self.bound_source.clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_compiled(&self) -> bool {
        self.symbols.is_some()
    }

    pub(crate) fn set_class(&mut self, class: Arc<ClassDefinition>) {
        self.fields_with_initializers = class.fields_with_initializers().cloned().collect();
        self.class = Some(class);
    }

    /// Position of `span` in the user's file
    pub fn position(&self, span: Span) -> LinePosition {
        LinePosition::of(&self.bound_source, span.start).translated(self.header_lines)
    }

    /// Diagnostic at `span` of this module
    pub fn error_at(&self, kind: ErrorKind, message: impl Into<String>, span: Span) -> CompileError {
        CompileError::new(kind, self.script.clone(), message, self.position(span))
    }

    /// Diagnostic without a meaningful position
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> CompileError {
        CompileError::new(kind, self.script.clone(), message, LinePosition::default())
    }

    pub(crate) fn diagnostic(&self, diagnostic: TaskDiagnostic) -> CompileError {
        let position = diagnostic
            .span
            .map(|span| self.position(span))
            .unwrap_or_default();
        let error = CompileError::new(diagnostic.kind, self.script.clone(), diagnostic.message, position);
        match diagnostic.code {
            Some(code) => error.with_code(code),
            None => error,
        }
    }

    /// Log a diagnostic and record it on the module
    pub(crate) fn report(&mut self, error: CompileError) {
        error!(file = %error.script, kind = %error.kind, "{}", error);
        self.errors.push(error);
    }
}

/// Diagnostic produced on a worker thread, positioned later
#[derive(Debug, Clone)]
pub(crate) struct TaskDiagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<&'static str>,
    /// `None` positions the diagnostic at the start of the file
    pub span: Option<Span>,
}

impl TaskDiagnostic {
    /// Unexpected worker failure, reported as a diagnostic of `kind`
    pub fn internal(kind: ErrorKind, message: &str, span: Option<Span>) -> Self {
        Self {
            kind,
            message: format!("internal compiler error: {}", message),
            code: None,
            span,
        }
    }
}

/// Every bound class of a build, in module order
#[derive(Debug, Clone, Default)]
pub struct ClassSet(Vec<Arc<ClassDefinition>>);

impl ClassSet {
    pub fn new(classes: Vec<Arc<ClassDefinition>>) -> Self {
        Self(classes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.0.iter().map(|c| c.as_ref())
    }
}

impl ClassLookup for ClassSet {
    fn class(&self, name: &str) -> Option<&ClassDefinition> {
        self.iter().find(|c| c.name == name)
    }
}
