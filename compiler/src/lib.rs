// flowc — Flowgraph compiler with runaway safety analysis
//
// Library root. Front-end (lexer, parser, lowering, graph construction),
// the temporal analysis, and the pass pipeline that drives them.

pub mod ast;
pub mod classify;
pub mod diag;
pub mod dot;
pub mod graph;
pub mod lexer;
pub mod lower;
pub mod options;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod propagate;
pub mod runaway;
pub mod source;
pub mod temporal;

pub use pipeline::{compile, compile_str, CompileError};
pub use runaway::{analyze, RunawayError};
