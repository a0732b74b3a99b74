//! Script references and the preprocessor define header

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identity of one module's source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptRef(PathBuf);

impl ScriptRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Path with separators normalized to `/`
    pub fn display_path(&self) -> String {
        self.0.to_string_lossy().replace('\\', "/")
    }

    /// File name component, or the whole path when there is none
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display_path())
    }
}

impl fmt::Display for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_path())
    }
}

impl From<&str> for ScriptRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// `#define` lines prepended to every module source before binding
///
/// Diagnostics are reported relative to the user's file, so every line
/// number coming out of the parser is shifted by [`DefineHeader::line_count`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefineHeader {
    defines: Vec<String>,
    text: String,
}

impl DefineHeader {
    pub fn new<I, S>(defines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let defines: Vec<String> = defines
            .into_iter()
            .map(Into::into)
            .filter(|d| !d.trim().is_empty())
            .collect();
        let text = defines
            .iter()
            .map(|d| format!("#define {}\n", d.trim()))
            .collect();
        Self { defines, text }
    }

    pub fn defines(&self) -> &[String] {
        &self.defines
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines the header occupies
    pub fn line_count(&self) -> usize {
        self.text.matches('\n').count()
    }

    /// Header followed by the module source
    pub fn apply(&self, source: &str) -> String {
        let mut full = String::with_capacity(self.text.len() + source.len());
        full.push_str(&self.text);
        full.push_str(source);
        full
    }
}
