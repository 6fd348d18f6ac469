// pipeline.rs — Compilation state and pass orchestration
//
// Holds all pass artifacts and runs the minimal set of passes for a given
// terminal PassId. Also exposes the one-call `compile` entry point used by
// library callers and tests.
//
// Preconditions: the program must be parsed before calling run_pipeline.
// Postconditions: all artifacts for required passes are populated, or has_error is set.
// Failure modes: any pass emitting diagnostics.
// Side effects: calls on_pass_complete after each pass; logs pass timings via `tracing`.

use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ast::Program;
use crate::diag::{codes, Diagnostic};
use crate::graph::FlowGraph;
use crate::lower::LoweredProgram;
use crate::pass::{descriptor, required_passes, PassId};
use crate::propagate::TemporalMap;
use crate::runaway::{RunawayError, Violation};
use crate::source::SourceFile;

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible builds and cache-key use.
///
/// `source_hash`: SHA-256 of the raw source text.
/// `graph_fingerprint`: SHA-256 of the graph's textual dump (`FlowGraph`'s
/// `Display`: kinds, typed options, locations, edge order) followed by each
/// node's proc text, so adapter names, fields and reducer expressions count.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub graph_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

#[derive(Serialize)]
struct ProvenanceRecord<'a> {
    source_hash: String,
    graph_fingerprint: String,
    compiler_version: &'a str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the graph fingerprint (64 characters).
    pub fn graph_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.graph_fingerprint)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        let record = ProvenanceRecord {
            source_hash: self.source_hash_hex(),
            graph_fingerprint: self.graph_fingerprint_hex(),
            compiler_version: self.compiler_version,
        };
        let mut json = serde_json::to_string_pretty(&record)
            .unwrap_or_else(|_| String::from("{}"));
        json.push('\n');
        json
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Compute provenance from source text and the built graph.
pub fn compute_provenance(source: &str, graph: &FlowGraph) -> Provenance {
    let mut hasher = Sha256::new();
    hasher.update(graph.to_string().as_bytes());
    for node in &graph.nodes {
        let text = source
            .get(node.location.start.offset..node.location.end.offset)
            .unwrap_or_default();
        hasher.update(text.trim_end().as_bytes());
        hasher.update(b"\n");
    }
    let mut graph_fingerprint = [0u8; 32];
    graph_fingerprint.copy_from_slice(&hasher.finalize());

    Provenance {
        source_hash: sha256(source.as_bytes()),
        graph_fingerprint,
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Holds all compilation artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub source: SourceFile,
    pub program: Program,
    pub lowered: Option<LoweredProgram>,
    pub graph: Option<FlowGraph>,
    pub temporal: Option<TemporalMap>,
    pub violations: Option<Vec<Violation>>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(source: SourceFile, program: Program) -> Self {
        Self {
            source,
            program,
            lowered: None,
            graph: None,
            temporal: None,
            violations: None,
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }
}

/// Knobs for a pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Report every runaway violation, not just the first.
    pub all_violations: bool,
}

// ── Error types ────────────────────────────────────────────────────────────

/// Pipeline execution failed due to diagnostics emitted by a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pass {failing_pass:?} reported errors")]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

/// Failure of the one-call `compile` entry point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Parse, lowering or graph construction errors.
    #[error("{} error(s): {}", .0.len(), first_message(.0))]
    Diagnostics(Vec<Diagnostic>),
    #[error(transparent)]
    Runaway(#[from] RunawayError),
}

fn first_message(diags: &[Diagnostic]) -> &str {
    diags.first().map_or("", |d| d.message.as_str())
}

/// Per-pass post-processing: callback, accumulate, timing log, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = !diags.is_empty();
    tracing::info!(
        pass = descriptor(pass_id).name,
        diagnostics = diags.len(),
        "pass complete, {:.1}ms",
        elapsed.as_secs_f64() * 1000.0
    );
    state.diagnostics.extend(diags);
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

// ── Parsing ────────────────────────────────────────────────────────────────

/// Parse source text. Parse errors become PARSE-ERROR diagnostics.
pub fn parse_program(source: &SourceFile) -> Result<Program, Vec<Diagnostic>> {
    let result = crate::parser::parse(source.text());
    if result.errors.is_empty() {
        if let Some(program) = result.program {
            return Ok(program);
        }
    }
    let mut diags: Vec<Diagnostic> = result
        .errors
        .iter()
        .map(|e| Diagnostic::error(codes::PARSE_ERROR, *e.span(), e.to_string()))
        .collect();
    if diags.is_empty() {
        let end = source.text().len();
        diags.push(Diagnostic::error(
            codes::PARSE_ERROR,
            (end..end).into(),
            "could not parse program",
        ));
    }
    Err(diags)
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → timing log → error check.
///
/// Preconditions: `state.program` is set.
/// Postconditions: artifacts for all passes in `required_passes(terminal)` are populated,
///   or `state.has_error` is true.
/// Failure modes: any pass producing diagnostics.
/// Side effects: calls `on_pass_complete` after each pass for immediate diagnostic display.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    options: PipelineOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        let t = Instant::now();
        match pass_id {
            PassId::Lower => {
                let result = crate::lower::lower_program(&state.program);
                state.lowered = Some(result.lowered);
                finish_pass(state, pass_id, result.diagnostics, t.elapsed(), &mut on_pass_complete)?;
            }
            PassId::BuildGraph => {
                let lowered = state.lowered.as_ref().expect("lower runs before build_graph");
                let result = crate::graph::build_graph(lowered, &state.source);
                state.provenance = Some(compute_provenance(state.source.text(), &result.graph));
                state.graph = Some(result.graph);
                finish_pass(state, pass_id, result.diagnostics, t.elapsed(), &mut on_pass_complete)?;
            }
            PassId::Propagate => {
                let graph = state.graph.as_ref().expect("build_graph runs before propagate");
                state.temporal = Some(crate::propagate::propagate(graph));
                finish_pass(state, pass_id, Vec::new(), t.elapsed(), &mut on_pass_complete)?;
            }
            PassId::CheckRunaway => {
                let graph = state.graph.as_ref().expect("build_graph runs before check_runaway");
                let temporal = state.temporal.as_ref().expect("propagate runs before check_runaway");
                let violations: Vec<Violation> =
                    crate::runaway::violations(graph, temporal).collect();
                let reported = if options.all_violations {
                    violations.len()
                } else {
                    violations.len().min(1)
                };
                let diags = violations[..reported]
                    .iter()
                    .map(Violation::to_diagnostic)
                    .collect();
                state.violations = Some(violations);
                finish_pass(state, pass_id, diags, t.elapsed(), &mut on_pass_complete)?;
            }
        }
    }
    Ok(())
}

// ── One-call entry point ───────────────────────────────────────────────────

/// Compile a program to its verified operator graph.
///
/// Front-end errors come back as `CompileError::Diagnostics`; a runaway
/// program as `CompileError::Runaway`.
pub fn compile(source: &SourceFile) -> Result<FlowGraph, CompileError> {
    let program = parse_program(source).map_err(CompileError::Diagnostics)?;
    let mut state = CompilationState::new(source.clone(), program);
    if run_pipeline(&mut state, PassId::BuildGraph, PipelineOptions::default(), |_, _| {}).is_err() {
        return Err(CompileError::Diagnostics(state.diagnostics));
    }
    let graph = state.graph.take().expect("build_graph populated the graph");
    Ok(crate::runaway::analyze(graph)?)
}

/// Compile program text reported under the filename `main`.
pub fn compile_str(text: &str) -> Result<FlowGraph, CompileError> {
    compile(&SourceFile::main(text))
}
