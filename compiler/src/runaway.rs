// runaway.rs — Runaway program detection
//
// A program is a runaway when an operator that must see the end of its input
// (non-windowed reduce, sort, tail) is fed by a live stream without window
// boundaries: it would buffer forever and never emit. The blame goes to the
// live source the stream came from, not to the blocking operator.
//
// Preconditions: `graph` is a DAG built by `graph::build_graph` (or by hand
//                with valid node ids).
// Postconditions: `analyze` returns the graph unchanged, or the first
//                 violation in topological order as a `RunawayError`.
// Failure modes: `RunawayError` (code RUNAWAY-PROGRAM), always fatal.
// Side effects: emits `tracing` events.

use serde::Serialize;
use thiserror::Error;

use crate::classify::{classify, Requirement, Transform};
use crate::diag::{codes, Diagnostic};
use crate::graph::{Adjacency, FlowGraph, NodeId};
use crate::propagate::{propagate, TemporalMap};
use crate::source::Location;

pub const RUNAWAY_CODE: &str = codes::RUNAWAY_PROGRAM.0;

// ── Violations ──────────────────────────────────────────────────────────────

/// A blocking operator reached by an unbounded live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub node: NodeId,
    /// Name of the blocking proc (`tail`, `sort`, `reduce`).
    pub op_name: String,
    pub op_location: Location,
    /// Location of the live source that makes the input unbounded.
    pub provenance: Location,
    /// Operators between the source and the blocking operator, source first.
    pub path: Vec<Hop>,
    pub code: &'static str,
    pub message: String,
}

/// One operator the live stream passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub name: String,
    pub transform: Transform,
    pub location: Location,
}

impl Hop {
    fn describe(&self) -> String {
        match self.transform {
            Transform::Unwindow => format!("`{}` removes the window boundaries", self.name),
            Transform::Window => format!("`{}` windows the stream", self.name),
            Transform::Origin | Transform::Preserve => {
                format!("the live stream passes through `{}`", self.name)
            }
        }
    }
}

impl Violation {
    /// Render through the common diagnostic path: primary span on the live
    /// source, related span on the blocking operator, one cause per hop.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(codes::RUNAWAY_PROGRAM, self.provenance.span(), &self.message)
            .with_related(
                self.op_location.span(),
                format!("`{}` buffers its whole input here", self.op_name),
            );
        self.path
            .iter()
            .fold(diag, |diag, hop| diag.with_cause(hop.describe(), Some(hop.location.span())))
            .with_hint(
                "window the stream with `batch -every :<interval>:` before this operator, \
                 or give the source an upper bound (-to, -last)",
            )
    }
}

/// Walk back from `id` to the source of its input class. Each step follows
/// the first predecessor whose output is the class the current node received.
fn live_path(
    graph: &FlowGraph,
    temporal: &TemporalMap,
    adjacency: &Adjacency,
    id: NodeId,
) -> Vec<Hop> {
    let mut path = Vec::new();
    let mut current = id;
    while let Some(&pred) = adjacency.incoming[current.index()]
        .iter()
        .find(|&&p| temporal.output(p) == temporal.input(current))
    {
        let node = graph.node(pred);
        let transform = classify(node.kind).transform;
        if transform == Transform::Origin {
            break;
        }
        path.push(Hop {
            name: node.name.clone(),
            transform,
            location: node.location.clone(),
        });
        current = pred;
    }
    path.reverse();
    path
}

/// Every violation in topological order.
pub fn violations<'a>(
    graph: &'a FlowGraph,
    temporal: &'a TemporalMap,
) -> impl Iterator<Item = Violation> + 'a {
    let adjacency = graph.adjacency();
    temporal.order().iter().filter_map(move |&id| {
        let node = graph.node(id);
        let requirement = classify(node.kind).requirement;
        let input = temporal.input(id);
        if requirement.admits(input) {
            return None;
        }
        debug_assert_eq!(requirement, Requirement::RequiresBounded);
        let provenance = input.provenance()?.clone();
        let message = format!(
            "Cannot run a program that would buffer live data forever: \
             `{}` never sees the end of its input",
            node.name
        );
        tracing::debug!(node = %id, op = %node.name, source = %provenance, "runaway violation");
        Some(Violation {
            node: id,
            op_name: node.name.clone(),
            op_location: node.location.clone(),
            provenance,
            path: live_path(graph, temporal, &adjacency, id),
            code: RUNAWAY_CODE,
            message,
        })
    })
}

/// Propagate classes and collect every violation in the graph.
pub fn find_violations(graph: &FlowGraph) -> Vec<Violation> {
    let temporal = propagate(graph);
    violations(graph, &temporal).collect()
}

// ── Verdict ─────────────────────────────────────────────────────────────────

/// Serialized as `{"code", "message", "info": {"location"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct RunawayError {
    pub code: &'static str,
    pub message: String,
    pub info: RunawayInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunawayInfo {
    pub location: Location,
}

impl From<&Violation> for RunawayError {
    fn from(v: &Violation) -> Self {
        RunawayError {
            code: v.code,
            message: v.message.clone(),
            info: RunawayInfo {
                location: v.provenance.clone(),
            },
        }
    }
}

/// Pass the graph through unchanged, or reject it with the first violation.
pub fn analyze(graph: FlowGraph) -> Result<FlowGraph, RunawayError> {
    let temporal = propagate(&graph);
    let first = violations(&graph, &temporal).next();
    match first {
        Some(v) => Err(RunawayError::from(&v)),
        None => Ok(graph),
    }
}
