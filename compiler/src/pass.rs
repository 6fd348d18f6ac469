// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the compiler's semantic passes (parse is outside the runner),
// their dependency edges, and the artifacts they produce. Used by the pipeline
// runner to compute minimal pass subsets for each --emit target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each compiler pass (parse excluded — handled before the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Lower,
    BuildGraph,
    Propagate,
    CheckRunaway,
}

/// Machine-readable artifact identifiers. Each maps to a field of
/// `CompilationState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Lowered,    // LoweredProgram
    Graph,      // FlowGraph
    Temporal,   // TemporalMap
    Violations, // Vec<Violation>
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Lower => PassDescriptor {
            name: "lower",
            inputs: &[],
            outputs: &[ArtifactId::Lowered],
            invariants: "every proc known, options typed and verified",
        },
        PassId::BuildGraph => PassDescriptor {
            name: "build_graph",
            inputs: &[PassId::Lower],
            outputs: &[ArtifactId::Graph],
            invariants: "graph is acyclic, every component starts at a source",
        },
        PassId::Propagate => PassDescriptor {
            name: "propagate",
            inputs: &[PassId::BuildGraph],
            outputs: &[ArtifactId::Temporal],
            invariants: "one input and one output class per node",
        },
        PassId::CheckRunaway => PassDescriptor {
            name: "check_runaway",
            inputs: &[PassId::BuildGraph, PassId::Propagate],
            outputs: &[ArtifactId::Violations],
            invariants: "no blocking operator consumes an unbounded live stream",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 4] = [
    PassId::Lower,
    PassId::BuildGraph,
    PassId::Propagate,
    PassId::CheckRunaway,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
