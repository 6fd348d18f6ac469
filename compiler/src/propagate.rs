// propagate.rs — Temporal-class propagation
//
// Walks the operator graph once in topological order. Each node's input
// class is the combination of its predecessors' output classes (edge order,
// first wins ties); its output class is the input run through the node's
// transform from the classification table.
//
// Preconditions: `graph` is acyclic (graph construction only builds DAGs).
// Postconditions: every node has exactly one input and one output class.
// Failure modes: a cyclic graph is an internal error and panics.
// Side effects: emits `tracing` events at trace/debug level.

use serde::Serialize;

use crate::classify::classify;
use crate::graph::{FlowGraph, NodeId};
use crate::temporal::TemporalClass;

/// Computed classes, indexed by `NodeId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalMap {
    order: Vec<NodeId>,
    inputs: Vec<TemporalClass>,
    outputs: Vec<TemporalClass>,
}

impl TemporalMap {
    /// The visiting order used to compute the map.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Class delivered to `id`, before its own transform.
    pub fn input(&self, id: NodeId) -> &TemporalClass {
        &self.inputs[id.index()]
    }

    /// Class `id` emits downstream.
    pub fn output(&self, id: NodeId) -> &TemporalClass {
        &self.outputs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// One record per node in id order, for `--emit temporal`.
    pub fn records<'a>(&'a self, graph: &'a FlowGraph) -> Vec<NodeClasses<'a>> {
        graph
            .nodes
            .iter()
            .map(|node| NodeClasses {
                id: node.id.0,
                name: &node.name,
                kind: node.kind.name(),
                input: self.input(node.id),
                output: self.output(node.id),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct NodeClasses<'a> {
    pub id: u32,
    pub name: &'a str,
    pub kind: &'static str,
    pub input: &'a TemporalClass,
    pub output: &'a TemporalClass,
}

/// Compute the temporal class of every node.
pub fn propagate(graph: &FlowGraph) -> TemporalMap {
    let order = graph
        .topological_order()
        .expect("operator graph must be acyclic");
    let adj = graph.adjacency();

    let mut inputs = vec![TemporalClass::Bounded; graph.len()];
    let mut outputs = vec![TemporalClass::Bounded; graph.len()];

    for &id in &order {
        let node = graph.node(id);
        let input = TemporalClass::combine(
            adj.incoming[id.index()]
                .iter()
                .map(|pred| outputs[pred.index()].clone()),
        );
        let output = classify(node.kind)
            .transform
            .apply(input.clone(), &node.options, &node.location);
        tracing::trace!(node = %id, name = %node.name, input = %input, output = %output, "classified");
        inputs[id.index()] = input;
        outputs[id.index()] = output;
    }

    tracing::debug!(nodes = graph.len(), edges = graph.edges.len(), "temporal classes propagated");
    TemporalMap {
        order,
        inputs,
        outputs,
    }
}
