// AST node types for flowgraph query programs.
//
// A program is a `;`-separated list of flowgraphs; a flowgraph is a `|`
// chain of procs and parallel blocks. Every node carries a `SimpleSpan` for
// error reporting in downstream phases.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct;
//                 a proc's span also covers the whitespace and comments that trail it.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete program: independent flowgraphs separated by `;`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub flowgraphs: Vec<Flowgraph>,
    pub span: Span,
}

// ── flowgraph: element ('|' element)* ──

#[derive(Debug, Clone, PartialEq)]
pub struct Flowgraph {
    pub elements: Vec<Element>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// `name option* arg*`
    Proc(ProcCall),
    /// `( flowgraph ; flowgraph ... )` — fan out to every branch, merge after.
    Parallel(ParallelBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallelBlock {
    pub branches: Vec<Flowgraph>,
    pub span: Span,
}

// ── proc: IDENT (option | expr)* ──

#[derive(Debug, Clone, PartialEq)]
pub struct ProcCall {
    pub name: Ident,
    pub options: Vec<ProcOption>,
    pub args: Vec<Expr>,
    pub span: Span,
}

impl ProcCall {
    pub fn option(&self, name: &str) -> Option<&ProcOption> {
        self.options.iter().find(|o| o.name.name == name)
    }
}

/// `-name value`. The leading `-` is not part of `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcOption {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

// ── Expressions ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=` (assignment in `put`, equality in `filter`)
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64, Span),
    StringLit(String, Span),
    /// `:text:` — moment or duration literal, delimiters stripped.
    Moment(String, Span),
    Ident(Ident),
    Call {
        name: Ident,
        args: Vec<Expr>,
        span: Span,
    },
    Compare {
        lhs: Box<Expr>,
        op: CmpOp,
        rhs: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, span) | Expr::StringLit(_, span) | Expr::Moment(_, span) => *span,
            Expr::Ident(ident) => ident.span,
            Expr::Call { span, .. } | Expr::Compare { span, .. } => *span,
        }
    }
}

// ── Identifier ──

/// An identifier with its source text and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}
