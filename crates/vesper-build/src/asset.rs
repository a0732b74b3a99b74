//! Program assets: the host-side owner of one module's compiled program

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use vesper_ast::ScriptRef;
use vesper_vm::{assemble, ExternRegistry, Program};

/// Host-side handle on one module's source and compiled program
///
/// The build only stages programs on an asset; nothing becomes live
/// until [`ProgramAsset::commit`] is called at finalize.
pub trait ProgramAsset: Send {
    /// Identity of the module source
    fn script(&self) -> &ScriptRef;

    /// Current source text, `None` when it cannot be read
    fn source_text(&self) -> Option<String>;

    fn set_assembly_text(&mut self, text: &str);

    fn assembly_text(&self) -> &str;

    /// Link the current assembly text into a staged program
    ///
    /// On failure the error string comes from the assembler and may be
    /// empty.
    fn assemble(&mut self, symbol_count: usize) -> Result<(), String>;

    /// Staged program produced by the last successful [`assemble`](Self::assemble)
    fn program(&self) -> Option<&Program>;

    fn program_mut(&mut self) -> Option<&mut Program>;

    fn compile_errors(&self) -> &[String];

    fn compile_errors_mut(&mut self) -> &mut Vec<String>;

    /// Make the staged program the live one
    fn commit(&mut self);

    /// Program currently in use by the host
    fn live_program(&self) -> Option<&Program>;
}

#[derive(Debug, Clone)]
enum SourceLocator {
    File(PathBuf),
    Inline(String),
}

/// Program asset assembling against the Vesper VM
#[derive(Debug, Clone)]
pub struct VmProgramAsset {
    script: ScriptRef,
    source: SourceLocator,
    externs: Arc<ExternRegistry>,
    assembly: String,
    staged: Option<Program>,
    live: Option<Program>,
    compile_errors: Vec<String>,
}

impl VmProgramAsset {
    /// Asset whose source is read from `path` on demand
    pub fn from_file(path: impl Into<PathBuf>, externs: Arc<ExternRegistry>) -> Self {
        let path = path.into();
        Self::with_locator(ScriptRef::new(path.clone()), SourceLocator::File(path), externs)
    }

    /// Asset with in-memory source
    pub fn inline(script: impl Into<ScriptRef>, source: impl Into<String>, externs: Arc<ExternRegistry>) -> Self {
        Self::with_locator(script.into(), SourceLocator::Inline(source.into()), externs)
    }

    fn with_locator(script: ScriptRef, source: SourceLocator, externs: Arc<ExternRegistry>) -> Self {
        Self {
            script,
            source,
            externs,
            assembly: String::new(),
            staged: None,
            live: None,
            compile_errors: Vec::new(),
        }
    }

    /// Report diagnostics under `script` instead of the file path
    pub fn with_script(mut self, script: ScriptRef) -> Self {
        self.script = script;
        self
    }

    /// Replace in-memory source; file-backed assets switch to inline
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = SourceLocator::Inline(source.into());
    }
}

impl ProgramAsset for VmProgramAsset {
    fn script(&self) -> &ScriptRef {
        &self.script
    }

    fn source_text(&self) -> Option<String> {
        match &self.source {
            SourceLocator::File(path) => fs::read_to_string(path).ok(),
            SourceLocator::Inline(text) => Some(text.clone()),
        }
    }

    fn set_assembly_text(&mut self, text: &str) {
        self.assembly = text.to_string();
    }

    fn assembly_text(&self) -> &str {
        &self.assembly
    }

    fn assemble(&mut self, symbol_count: usize) -> Result<(), String> {
        match assemble(&self.assembly, symbol_count, &self.externs) {
            Ok(program) => {
                self.staged = Some(program);
                Ok(())
            }
            Err(e) => {
                self.staged = None;
                Err(format!("[{}] {}", e.code(), e))
            }
        }
    }

    fn program(&self) -> Option<&Program> {
        self.staged.as_ref()
    }

    fn program_mut(&mut self) -> Option<&mut Program> {
        self.staged.as_mut()
    }

    fn compile_errors(&self) -> &[String] {
        &self.compile_errors
    }

    fn compile_errors_mut(&mut self) -> &mut Vec<String> {
        &mut self.compile_errors
    }

    fn commit(&mut self) {
        if let Some(program) = self.staged.clone() {
            self.live = Some(program);
        }
    }

    fn live_program(&self) -> Option<&Program> {
        self.live.as_ref()
    }
}
