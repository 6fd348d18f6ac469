// dot.rs — Graphviz DOT output for operator graphs
//
// Transforms a FlowGraph into DOT format suitable for rendering with `dot`.
// When temporal classes are supplied, nodes are coloured by the class they
// emit, edges are labelled with the class they carry, and blocking operators
// fed by an unbounded live stream are outlined in red.
//
// Preconditions: `graph` is a fully constructed FlowGraph; `temporal`, if
//                given, was computed from the same graph.
// Postconditions: returns a valid DOT string representing the graph.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::classify::{classify, OpKind, Requirement};
use crate::graph::{FlowGraph, Node};
use crate::propagate::TemporalMap;
use crate::temporal::TemporalClass;

/// Emit the operator graph as a Graphviz DOT string.
pub fn emit_dot(graph: &FlowGraph, temporal: Option<&TemporalMap>) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph flowc {{").unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();
    writeln!(buf).unwrap();

    for node in &graph.nodes {
        writeln!(buf, "    {} [{}];", node.id, node_attrs(node, temporal)).unwrap();
    }

    if !graph.edges.is_empty() {
        writeln!(buf).unwrap();
    }
    for edge in &graph.edges {
        match temporal {
            Some(map) => {
                let class = map.output(edge.from);
                writeln!(
                    buf,
                    "    {} -> {} [label=\"{}\", color={}];",
                    edge.from,
                    edge.to,
                    class.label(),
                    edge_color(class)
                )
                .unwrap();
            }
            None => writeln!(buf, "    {} -> {};", edge.from, edge.to).unwrap(),
        }
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn shape(kind: OpKind) -> &'static str {
    match kind {
        OpKind::Source => "cylinder",
        OpKind::Sink => "folder",
        OpKind::Merge => "invtriangle",
        OpKind::WindowedAggregate | OpKind::PeriodicAggregate => "box3d",
        OpKind::Aggregate | OpKind::Sort | OpKind::Tail => "octagon",
        OpKind::Head | OpKind::Unbatch | OpKind::PassThrough => "box",
    }
}

fn fill(class: &TemporalClass) -> &'static str {
    match class {
        TemporalClass::Bounded => "lightblue",
        TemporalClass::LiveWindowed(_) => "lightyellow",
        TemporalClass::LiveUnbounded(_) => "lightsalmon",
    }
}

fn edge_color(class: &TemporalClass) -> &'static str {
    match class {
        TemporalClass::Bounded => "gray40",
        TemporalClass::LiveWindowed(_) => "goldenrod",
        TemporalClass::LiveUnbounded(_) => "red",
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_attrs(node: &Node, temporal: Option<&TemporalMap>) -> String {
    let mut label = node.name.clone();
    if !node.options.is_empty() {
        label.push_str(&format!("\\n{}", escape(&node.options.to_string())));
    }
    let mut attrs = format!("shape={}, label=\"{}\"", shape(node.kind), label);

    if let Some(map) = temporal {
        write!(attrs, ", style=filled, fillcolor={}", fill(map.output(node.id))).unwrap();
        let requirement = classify(node.kind).requirement;
        if requirement == Requirement::RequiresBounded && !requirement.admits(map.input(node.id)) {
            attrs.push_str(", color=red, penwidth=2");
        }
    }
    attrs
}
