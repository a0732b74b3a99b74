//! Source location tracking

use serde::{Deserialize, Serialize};

/// A span representing a range in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start
    pub start: usize,
    /// Byte offset of the end (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Merge two spans into one that covers both
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Slice the covered text out of `source`, clamped to its bounds
    pub fn text(self, source: &str) -> &str {
        let end = self.end.min(source.len());
        let start = self.start.min(end);
        &source[start..end]
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}

/// Zero-based line and character of a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct LinePosition {
    pub line: usize,
    pub character: usize,
}

impl LinePosition {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }

    /// Locate `offset` inside `source`
    pub fn of(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let character = before[line_start..].chars().count();
        Self { line, character }
    }

    /// Shift the line up by `lines`, saturating at the first line
    pub fn translated(self, lines: usize) -> Self {
        Self {
            line: self.line.saturating_sub(lines),
            character: self.character,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_position_counts_lines_and_chars() {
        let source = "ab\ncde\nf";
        assert_eq!(LinePosition::of(source, 0), LinePosition::new(0, 0));
        assert_eq!(LinePosition::of(source, 4), LinePosition::new(1, 1));
        assert_eq!(LinePosition::of(source, 7), LinePosition::new(2, 0));
        assert_eq!(LinePosition::of(source, 100), LinePosition::new(2, 1));
    }

    #[test]
    fn test_translation_saturates() {
        let pos = LinePosition::new(1, 4).translated(3);
        assert_eq!(pos, LinePosition::new(0, 4));
    }
}
