// classify.rs — Operator classification table
//
// Every operator kind maps to a transform rule (how its output class is
// derived from its input class) and a buffering requirement (whether it must
// see the end of its input before emitting). The mapping is an exhaustive
// `match`: a new `OpKind` does not compile until both are supplied.
//
// Preconditions: none.
// Postconditions: `Transform::apply` never loses provenance of a live class.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::options::{OpOptions, UpperBound};
use crate::source::Location;
use crate::temporal::TemporalClass;

// ── Operator kinds ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// `read`, `emit`
    Source,
    /// `batch`: cuts the stream into periodic windows.
    WindowedAggregate,
    /// `reduce -every`: emits a result per period without batch marks.
    PeriodicAggregate,
    /// `reduce` without `-every`
    Aggregate,
    Sort,
    Tail,
    Head,
    /// `unbatch`: removes batch boundaries.
    Unbatch,
    /// `put`, `filter`, `pass`, `keep`, `remove`, `uniq`
    PassThrough,
    Merge,
    /// `view`, `write`
    Sink,
}

impl OpKind {
    pub const ALL: [OpKind; 11] = [
        OpKind::Source,
        OpKind::WindowedAggregate,
        OpKind::PeriodicAggregate,
        OpKind::Aggregate,
        OpKind::Sort,
        OpKind::Tail,
        OpKind::Head,
        OpKind::Unbatch,
        OpKind::PassThrough,
        OpKind::Merge,
        OpKind::Sink,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Source => "source",
            OpKind::WindowedAggregate => "windowed-aggregate",
            OpKind::PeriodicAggregate => "periodic-aggregate",
            OpKind::Aggregate => "aggregate",
            OpKind::Sort => "sort",
            OpKind::Tail => "tail",
            OpKind::Head => "head",
            OpKind::Unbatch => "unbatch",
            OpKind::PassThrough => "pass-through",
            OpKind::Merge => "merge",
            OpKind::Sink => "sink",
        }
    }

    pub fn is_source(self) -> bool {
        self == OpKind::Source
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ── Transform rules ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Output class comes from the node's own options; input is ignored.
    Origin,
    /// Live input becomes `LiveWindowed`, keeping its provenance.
    Window,
    /// `LiveWindowed` input becomes `LiveUnbounded`, keeping its provenance.
    Unwindow,
    /// Output class equals input class.
    Preserve,
}

impl Transform {
    pub fn apply(
        self,
        input: TemporalClass,
        options: &OpOptions,
        location: &Location,
    ) -> TemporalClass {
        match self {
            Transform::Origin => match (options.upper_bound(), options.is_windowed()) {
                (UpperBound::Fixed, _) => TemporalClass::Bounded,
                (UpperBound::Open, true) => TemporalClass::LiveWindowed(location.clone()),
                (UpperBound::Open, false) => TemporalClass::LiveUnbounded(location.clone()),
            },
            Transform::Window => match input {
                TemporalClass::Bounded => TemporalClass::Bounded,
                TemporalClass::LiveWindowed(loc) | TemporalClass::LiveUnbounded(loc) => {
                    TemporalClass::LiveWindowed(loc)
                }
            },
            Transform::Unwindow => match input {
                TemporalClass::LiveWindowed(loc) => TemporalClass::LiveUnbounded(loc),
                other => other,
            },
            Transform::Preserve => input,
        }
    }
}

// ── Buffering requirements ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Must see end of input (per batch, when the input is windowed).
    RequiresBounded,
    NoRequirement,
}

impl Requirement {
    /// Whether an input of class `input` satisfies this requirement.
    /// Windowed input is materialized one window at a time.
    pub fn admits(self, input: &TemporalClass) -> bool {
        match self {
            Requirement::RequiresBounded => !input.is_unbounded(),
            Requirement::NoRequirement => true,
        }
    }
}

// ── Table ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub transform: Transform,
    pub requirement: Requirement,
}

pub fn classify(kind: OpKind) -> Classification {
    use Requirement::*;
    use Transform::*;

    let (transform, requirement) = match kind {
        OpKind::Source => (Origin, NoRequirement),
        OpKind::WindowedAggregate => (Window, NoRequirement),
        OpKind::PeriodicAggregate => (Preserve, NoRequirement),
        OpKind::Aggregate => (Preserve, RequiresBounded),
        OpKind::Sort => (Preserve, RequiresBounded),
        OpKind::Tail => (Preserve, RequiresBounded),
        OpKind::Head => (Preserve, NoRequirement),
        OpKind::Unbatch => (Unwindow, NoRequirement),
        OpKind::PassThrough => (Preserve, NoRequirement),
        OpKind::Merge => (Preserve, NoRequirement),
        OpKind::Sink => (Preserve, NoRequirement),
    };
    Classification {
        transform,
        requirement,
    }
}
