//! Positioned user diagnostics

use std::fmt;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use vesper_ast::{LinePosition, ScriptRef};

/// Which stage of the build produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Malformed or unresolved source; fails the whole bind phase
    Bind,
    /// Code generation of one module
    Generate,
    /// Generated assembly failed to link against the VM
    Assemble,
    /// The synthesized initializer batch failed to compile
    InitializerCompile,
    /// An initializer produced a value that cannot be stored
    InitializerSemantic,
    /// Unexpected failure inside a worker
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Bind => "bind",
            ErrorKind::Generate => "generate",
            ErrorKind::Assemble => "assemble",
            ErrorKind::InitializerCompile => "initializer-compile",
            ErrorKind::InitializerSemantic => "initializer-semantic",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic positioned in the user's file
///
/// `line` and `character` are zero-based and already relative to the
/// user's text, not to the define header prepended before binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompileError {
    pub script: ScriptRef,
    pub message: String,
    pub line: usize,
    pub character: usize,
    pub kind: ErrorKind,
    code: Option<&'static str>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, script: ScriptRef, message: impl Into<String>, position: LinePosition) -> Self {
        Self {
            script,
            message: message.into(),
            line: position.line,
            character: position.character,
            kind,
            code: None,
        }
    }

    /// Attach the machine-readable code of the underlying error
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn code(&self) -> Option<&'static str> {
        self.code
    }

    pub fn position(&self) -> LinePosition {
        LinePosition::new(self.line, self.character)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({},{}): error: {}",
            self.script.display_path(),
            self.line + 1,
            self.character + 1,
            self.message
        )
    }
}

/// Render `error` against the user's source text
pub fn render_diagnostic(error: &CompileError, source: &str) -> String {
    let id = error.script.display_path();
    let offset = byte_offset(source, error.line, error.character);
    let end = source[offset..]
        .char_indices()
        .nth(1)
        .map(|(i, _)| offset + i)
        .unwrap_or(source.len());

    let mut builder = Report::build(ReportKind::Error, id.clone(), offset)
        .with_config(Config::default().with_color(false))
        .with_message(&error.message)
        .with_label(
            Label::new((id.clone(), offset..end))
                .with_message(&error.message)
                .with_color(Color::Red),
        );
    if let Some(code) = error.code {
        builder = builder.with_code(code);
    }

    let mut out = Vec::new();
    if builder
        .finish()
        .write((id, Source::from(source)), &mut out)
        .is_err()
    {
        return error.to_string();
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Byte offset of a zero-based line/character, clamped to the text
fn byte_offset(source: &str, line: usize, character: usize) -> usize {
    let line_start = if line == 0 {
        0
    } else {
        match source.match_indices('\n').nth(line - 1) {
            Some((i, _)) => i + 1,
            None => return source.len(),
        }
    };
    let rest = &source[line_start..];
    let line_text = rest.split('\n').next().unwrap_or("");
    let within = line_text
        .char_indices()
        .nth(character)
        .map(|(i, _)| i)
        .unwrap_or(line_text.len());
    line_start + within
}
