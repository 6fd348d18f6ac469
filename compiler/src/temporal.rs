// temporal.rs — Temporal classes of data paths
//
// Every edge of a flowgraph carries one of three temporal classes. Live
// classes remember the location of the source that made them live, so a
// violation far downstream can still point at its root cause.
//
// Preconditions: none (values only).
// Postconditions: `join` is the maximum under Bounded < LiveWindowed <
//                 LiveUnbounded, keeping the left operand on ties.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::source::Location;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "class", content = "provenance", rename_all = "kebab-case")]
pub enum TemporalClass {
    /// Finite data: every consumer eventually sees end of stream.
    Bounded,
    /// Live, but cut into periodic windows that each terminate.
    LiveWindowed(Location),
    /// Live with no window boundaries: never terminates.
    LiveUnbounded(Location),
}

impl TemporalClass {
    pub fn rank(&self) -> u8 {
        match self {
            TemporalClass::Bounded => 0,
            TemporalClass::LiveWindowed(_) => 1,
            TemporalClass::LiveUnbounded(_) => 2,
        }
    }

    /// Location of the live source this class derives from.
    pub fn provenance(&self) -> Option<&Location> {
        match self {
            TemporalClass::Bounded => None,
            TemporalClass::LiveWindowed(loc) | TemporalClass::LiveUnbounded(loc) => Some(loc),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, TemporalClass::LiveUnbounded(_))
    }

    /// The more dangerous of two classes; `self` wins ties.
    pub fn join(self, other: TemporalClass) -> TemporalClass {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Combine the classes arriving on a node's input edges, in edge order.
    /// A node with no inputs is `Bounded`.
    pub fn combine<I>(inputs: I) -> TemporalClass
    where
        I: IntoIterator<Item = TemporalClass>,
    {
        let mut inputs = inputs.into_iter();
        match inputs.next() {
            Some(first) => inputs.fold(first, TemporalClass::join),
            None => TemporalClass::Bounded,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemporalClass::Bounded => "bounded",
            TemporalClass::LiveWindowed(_) => "live-windowed",
            TemporalClass::LiveUnbounded(_) => "live-unbounded",
        }
    }
}

impl fmt::Display for TemporalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.provenance() {
            Some(loc) => write!(f, "{} (from {})", self.label(), loc),
            None => write!(f, "{}", self.label()),
        }
    }
}
