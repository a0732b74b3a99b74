//! Compilation backend for initializer units

use std::fmt;

use thiserror::Error;
use vesper_ast::LinePosition;
use vesper_symbols::ClassLookup;
use vesper_vm::{ExternError, HeapError, Program};

use super::{HeapBridge, InitializerUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// Diagnostic against a synthesized unit's own text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDiagnostic {
    pub severity: Severity,
    /// Index of the unit in the batch
    pub unit: usize,
    pub message: String,
    pub code: Option<&'static str>,
    pub position: LinePosition,
}

impl InitializerDiagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for InitializerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "{}({},{}): {}",
            InitializerUnit::class_name_for(self.unit),
            self.position.line + 1,
            self.position.character + 1,
            severity
        )?;
        if let Some(code) = self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Failure while running an entry routine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InitializerFault {
    #[error(transparent)]
    Extern(#[from] ExternError),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error("no entry routine for '{0}' in the initializer assembly")]
    MissingEntry(String),
}

/// Loaded result of compiling one batch of units
pub trait InitializerAssembly: Send {
    /// Batch id, `init0`, `init1`, ...
    fn id(&self) -> &str;

    /// Run the entry routine of the unit named `class_name` against a
    /// module's live program
    fn invoke(&self, class_name: &str, program: &mut Program, bridge: &HeapBridge) -> Result<(), InitializerFault>;
}

/// Outcome of compiling a batch
pub struct InitializerCompilation {
    pub diagnostics: Vec<InitializerDiagnostic>,
    /// Present only when no diagnostic is an error
    pub assembly: Option<Box<dyn InitializerAssembly>>,
}

impl InitializerCompilation {
    pub fn errors(&self) -> impl Iterator<Item = &InitializerDiagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

impl fmt::Debug for InitializerCompilation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializerCompilation")
            .field("diagnostics", &self.diagnostics)
            .field("assembly", &self.assembly.as_ref().map(|a| a.id().to_string()))
            .finish()
    }
}

/// Compiles a whole batch of units as one disposable unit
pub trait InitializerBackend: Send + Sync {
    fn compile(
        &self,
        assembly_id: &str,
        units: &[InitializerUnit],
        classes: &dyn ClassLookup,
    ) -> InitializerCompilation;
}
