// source.rs — Source text, line index, and reported locations
//
// Maps byte-offset spans produced by the lexer/parser to the
// `{filename, start, end}` locations carried by diagnostics and by the
// provenance of temporal classes.
//
// Preconditions: spans lie within the source text and on char boundaries.
// Postconditions: lines and columns are 1-based, offsets are 0-based byte
//                 offsets, and `end` is exclusive.
// Failure modes: none (out-of-range offsets are clamped to the text length).
// Side effects: none.

use std::fmt;

use chumsky::span::Span as _;
use serde::Serialize;

use crate::ast::Span;

/// Filename reported for programs compiled from an in-memory string.
pub const MAIN_FILENAME: &str = "main";

// ── Locations ───────────────────────────────────────────────────────────────

/// A single point in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

/// A source range with its filename. Owned, so it can be copied into
/// diagnostics independently of the graph it was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub filename: String,
    pub start: Position,
    pub end: Position,
}

impl Location {
    /// Byte-offset span covered by this location.
    pub fn span(&self) -> Span {
        Span::new((), self.start.offset..self.end.offset)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}:{}",
            self.filename, self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

// ── Source file ─────────────────────────────────────────────────────────────

/// A named program text plus the byte offset of every line start.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        line_starts.extend(
            text.char_indices()
                .filter(|&(_, c)| c == '\n')
                .map(|(i, _)| i + 1),
        );
        SourceFile {
            name: name.into(),
            text,
            line_starts,
        }
    }

    /// A program compiled from a string, reported as `main`.
    pub fn main(text: impl Into<String>) -> Self {
        Self::new(MAIN_FILENAME, text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolve a byte offset to a line/column position.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line_idx];
        let column = self.text[line_start..offset].chars().count() as u32 + 1;
        Position {
            line: line_idx as u32 + 1,
            column,
            offset,
        }
    }

    /// Resolve a span to an owned location in this file.
    pub fn location(&self, span: Span) -> Location {
        Location {
            filename: self.name.clone(),
            start: self.position(span.start()),
            end: self.position(span.end()),
        }
    }
}
