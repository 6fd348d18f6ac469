// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used across all compiler phases, the
// stable code table, and the two renderings the CLI offers: human text and
// one JSON error record per diagnostic.
//
// Preconditions: spans passed to `render`/`report` lie within the source file.
// Postconditions: none (types and pure formatting only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::ast::Span;
use crate::source::{Location, SourceFile};

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `RUNAWAY-PROGRAM`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Front-end
    pub const PARSE_ERROR: DiagCode = DiagCode("PARSE-ERROR");
    pub const UNKNOWN_PROC: DiagCode = DiagCode("UNKNOWN-PROC");
    pub const UNKNOWN_OPTION: DiagCode = DiagCode("UNKNOWN-OPTION");
    pub const DUPLICATE_OPTION: DiagCode = DiagCode("DUPLICATE-OPTION");
    pub const INVALID_OPTION_VALUE: DiagCode = DiagCode("INVALID-OPTION-VALUE");
    pub const MISSING_OPTION: DiagCode = DiagCode("MISSING-OPTION");
    pub const INCOMPATIBLE_OPTIONS: DiagCode = DiagCode("INCOMPATIBLE-OPTIONS");
    pub const MISSING_ARGUMENT: DiagCode = DiagCode("MISSING-ARGUMENT");
    pub const INVALID_ARGUMENT: DiagCode = DiagCode("INVALID-ARGUMENT");

    // Graph construction
    pub const MISPLACED_SOURCE: DiagCode = DiagCode("MISPLACED-SOURCE");
    pub const MISSING_SOURCE: DiagCode = DiagCode("MISSING-SOURCE");

    // Runaway analysis
    pub const RUNAWAY_PROGRAM: DiagCode = DiagCode("RUNAWAY-PROGRAM");
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Cause record ─────────────────────────────────────────────────────────

/// One link in a cause chain explaining how a temporal class reached a node.
#[derive(Debug, Clone, PartialEq)]
pub struct CauseRecord {
    pub message: String,
    pub span: Option<Span>,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase. Every diagnostic is an error:
/// a program either compiles cleanly or is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
    pub cause_chain: Vec<CauseRecord>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, related spans, or causes.
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
            cause_chain: Vec::new(),
        }
    }

    /// Shorthand for a coded error, the common case in every phase.
    pub fn error(code: DiagCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(span, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related span.
    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    /// Attach a cause record to the chain.
    pub fn with_cause(mut self, message: impl Into<String>, span: Option<Span>) -> Self {
        self.cause_chain.push(CauseRecord {
            message: message.into(),
            span,
        });
        self
    }

    /// Human-readable rendering with resolved locations:
    ///
    /// ```text
    /// error[RUNAWAY-PROGRAM]: ...
    ///   --> main:1:1-1:32
    ///   = note: `tail` here (main:1:34-1:41)
    ///   = hint: ...
    /// ```
    pub fn render(&self, source: &SourceFile) -> String {
        let mut out = format!("{}", Headline(self));
        out.push_str(&format!("\n  --> {}", source.location(self.span)));
        for related in &self.related_spans {
            out.push_str(&format!(
                "\n  = note: {} ({})",
                related.label,
                source.location(related.span)
            ));
        }
        for cause in &self.cause_chain {
            match cause.span {
                Some(span) => out.push_str(&format!(
                    "\n  = cause: {} ({})",
                    cause.message,
                    source.location(span)
                )),
                None => out.push_str(&format!("\n  = cause: {}", cause.message)),
            }
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\n  = hint: {hint}"));
        }
        out
    }

    /// The `{code, message, info: {location}}` error record.
    pub fn report(&self, source: &SourceFile) -> ErrorReport {
        ErrorReport {
            code: self.code.map(|c| c.0).unwrap_or("ERROR"),
            message: self.message.clone(),
            info: ErrorInfo {
                location: source.location(self.span),
            },
        }
    }
}

/// `error[CODE]: message` without hint or locations.
struct Headline<'a>(&'a Diagnostic);

impl fmt::Display for Headline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        match &d.code {
            Some(code) => write!(f, "error[{}]: {}", code, d.message),
            None => write!(f, "error: {}", d.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Headline(self))?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

// ── Serialized error record ──────────────────────────────────────────────

/// Machine-readable error: `{"code", "message", "info": {"location"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    pub info: ErrorInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        use chumsky::span::Span as _;
        Span::new((), 0..1)
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(dummy_span(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::new(dummy_span(), "unknown option `-kee`")
            .with_code(codes::UNKNOWN_OPTION)
            .with_hint("did you mean `-key`?");
        assert_eq!(
            format!("{d}"),
            "error[UNKNOWN-OPTION]: unknown option `-kee`\n  hint: did you mean `-key`?"
        );
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::error(codes::RUNAWAY_PROGRAM, dummy_span(), "cannot finish")
            .with_hint("insert batch -every")
            .with_related(dummy_span(), "`tail` here")
            .with_cause("`read` has no upper time bound", Some(dummy_span()));

        assert_eq!(d.code, Some(codes::RUNAWAY_PROGRAM));
        assert_eq!(d.hint.as_deref(), Some("insert batch -every"));
        assert_eq!(d.related_spans.len(), 1);
        assert_eq!(d.cause_chain.len(), 1);
    }

    #[test]
    fn render_resolves_locations() {
        use chumsky::span::Span as _;
        let src = SourceFile::main("emit | tail 1");
        let d = Diagnostic::error(codes::RUNAWAY_PROGRAM, Span::new((), 0..5), "cannot finish")
            .with_related(Span::new((), 7..13), "`tail` here")
            .with_hint("bound the source");
        assert_eq!(
            d.render(&src),
            "error[RUNAWAY-PROGRAM]: cannot finish\n  --> main:1:1-1:6\n  = note: `tail` here (main:1:8-1:14)\n  = hint: bound the source"
        );
    }

    #[test]
    fn render_lists_causes_between_notes_and_hint() {
        use chumsky::span::Span as _;
        let src = SourceFile::main("emit | put a = 1 | tail 1");
        let d = Diagnostic::error(codes::RUNAWAY_PROGRAM, Span::new((), 0..5), "cannot finish")
            .with_related(Span::new((), 19..25), "`tail` here")
            .with_cause("the live stream passes through `put`", Some(Span::new((), 7..17)))
            .with_cause("no location", None)
            .with_hint("bound the source");
        assert_eq!(
            d.render(&src),
            "error[RUNAWAY-PROGRAM]: cannot finish\n  --> main:1:1-1:6\n  \
             = note: `tail` here (main:1:20-1:26)\n  \
             = cause: the live stream passes through `put` (main:1:8-1:18)\n  \
             = cause: no location\n  \
             = hint: bound the source"
        );
    }

    #[test]
    fn report_serializes_code_message_and_location() {
        use chumsky::span::Span as _;
        let src = SourceFile::main("frob 1");
        let d = Diagnostic::error(codes::UNKNOWN_PROC, Span::new((), 0..5), "unknown proc `frob`");
        let json = serde_json::to_value(d.report(&src)).unwrap();
        assert_eq!(json["code"], "UNKNOWN-PROC");
        assert_eq!(json["message"], "unknown proc `frob`");
        assert_eq!(json["info"]["location"]["filename"], "main");
        assert_eq!(json["info"]["location"]["end"]["offset"], 5);
    }
}
