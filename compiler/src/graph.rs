// graph.rs — Operator graph construction
//
// Transforms the lowered program into one directed operator graph: an arena
// of nodes (`NodeId` = index) and an ordered edge list. Independent
// flowgraphs become disconnected components; parallel blocks fan out from
// the preceding stage and fan back in to the following one.
//
// Preconditions: `lowered` comes from a `LowerResult` without errors.
// Postconditions: returns a DAG whose edge order follows source order; every
//                 component starts at a source node.
// Failure modes: a source after `|` → MISPLACED-SOURCE; a flowgraph that does
//                not start with a source → MISSING-SOURCE.
// Side effects: none.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use crate::ast::Span;
use crate::classify::OpKind;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::lower::{LoweredFlowgraph, LoweredProgram, Operator, Stage};
use crate::options::OpOptions;
use crate::source::{Location, SourceFile};

// ── Public types ────────────────────────────────────────────────────────────

/// Index of a node in `FlowGraph::nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One proc occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Proc name as written, for messages.
    pub name: String,
    pub kind: OpKind,
    pub options: OpOptions,
    pub location: Location,
}

/// A directed edge. Position in `FlowGraph::edges` is significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

/// The operator graph of a whole program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Index-based adjacency, neighbours listed in edge insertion order.
#[derive(Debug, Clone)]
pub struct Adjacency {
    pub incoming: Vec<Vec<NodeId>>,
    pub outgoing: Vec<Vec<NodeId>>,
}

/// Result of graph construction.
#[derive(Debug)]
pub struct GraphResult {
    pub graph: FlowGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: OpKind,
        options: OpOptions,
        location: Location,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name: name.into(),
            kind,
            options,
            location,
        });
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        debug_assert!(from.index() < self.nodes.len() && to.index() < self.nodes.len());
        self.edges.push(Edge { from, to });
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn adjacency(&self) -> Adjacency {
        let mut incoming = vec![Vec::new(); self.nodes.len()];
        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            outgoing[edge.from.index()].push(edge.to);
            incoming[edge.to.index()].push(edge.from);
        }
        Adjacency { incoming, outgoing }
    }

    /// Kahn's algorithm; among ready nodes the lowest id goes first.
    /// Returns `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<NodeId>> {
        let adj = self.adjacency();
        let mut in_degree: Vec<usize> = adj.incoming.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<NodeId>> = self
            .nodes
            .iter()
            .filter(|n| in_degree[n.id.index()] == 0)
            .map(|n| Reverse(n.id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for &next in &adj.outgoing[id.index()] {
                let deg = &mut in_degree[next.index()];
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }
}

impl fmt::Display for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{} {} <{}>", node.id, node.name, node.kind)?;
            if !node.options.is_empty() {
                write!(f, " {}", node.options)?;
            }
            writeln!(f, " @ {}", node.location)?;
        }
        for edge in &self.edges {
            writeln!(f, "{} -> {}", edge.from, edge.to)?;
        }
        Ok(())
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Build the operator graph for a lowered program.
pub fn build_graph(lowered: &LoweredProgram, source: &SourceFile) -> GraphResult {
    let mut builder = GraphBuilder {
        source,
        graph: FlowGraph::new(),
        diagnostics: Vec::new(),
    };
    for fg in &lowered.flowgraphs {
        builder.build_chain(fg, &[]);
    }
    GraphResult {
        graph: builder.graph,
        diagnostics: builder.diagnostics,
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

struct GraphBuilder<'a> {
    source: &'a SourceFile,
    graph: FlowGraph,
    diagnostics: Vec<Diagnostic>,
}

impl GraphBuilder<'_> {
    /// Wire a chain after `entries` (its upstream exits) and return the
    /// chain's own exits.
    fn build_chain(&mut self, fg: &LoweredFlowgraph, entries: &[NodeId]) -> Vec<NodeId> {
        let mut exits = entries.to_vec();
        for stage in &fg.stages {
            exits = match stage {
                Stage::Op(op) => vec![self.add_operator(op, &exits)],
                Stage::Parallel(branches) => branches
                    .iter()
                    .flat_map(|branch| self.build_chain(branch, &exits))
                    .collect(),
            };
        }
        exits
    }

    fn add_operator(&mut self, op: &Operator, inputs: &[NodeId]) -> NodeId {
        match (op.kind.is_source(), inputs.is_empty()) {
            (true, false) => self.error_at(
                op.span,
                codes::MISPLACED_SOURCE,
                format!("`{}` is a source and must start a flowgraph", op.name),
            ),
            (false, true) => self.error_at(
                op.span,
                codes::MISSING_SOURCE,
                format!("flowgraph must start with a source, found `{}`", op.name),
            ),
            _ => {}
        }

        let location = self.source.location(op.span);
        let id = self
            .graph
            .add_node(op.name.clone(), op.kind, op.options.clone(), location);
        for &input in inputs {
            self.graph.add_edge(input, id);
        }
        id
    }

    fn error_at(&mut self, span: Span, code: DiagCode, message: String) {
        self.diagnostics.push(Diagnostic::error(code, span, message));
    }
}
