// Property-based tests for the runaway check.
//
// Generated single- and multi-chain programs are compiled end to end and the
// verdict is compared with a small reference model of the temporal classes:
// - verdict agrees with the model (soundness and completeness)
// - head never rejects, bounded sources never reject
// - analysis is idempotent and deterministic
// - one unsafe chain rejects the whole program, blaming its source
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use flowc::{analyze, compile_str, CompileError};
use proptest::prelude::*;

// ── Reference model ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Bounded,
    Windowed,
    Unbounded,
}

#[derive(Debug, Clone, Copy)]
enum Effect {
    Keep,
    Window,
    Unwindow,
}

#[derive(Debug, Clone, Copy)]
struct Op {
    text: &'static str,
    blocking: bool,
    effect: Effect,
}

#[derive(Debug, Clone, Copy)]
struct Source {
    text: &'static str,
    class: Class,
}

const SOURCES: &[Source] = &[
    Source { text: "read t -to :end:", class: Class::Unbounded },
    Source { text: "read t -from :0: -to :end:", class: Class::Unbounded },
    Source { text: "emit -to :end:", class: Class::Unbounded },
    Source { text: "read t -to :end: -every :1s:", class: Class::Windowed },
    Source { text: "read t -last :1h:", class: Class::Bounded },
    Source { text: "read t -to :now:", class: Class::Bounded },
    Source { text: "read t -to :end: -limit 5", class: Class::Bounded },
    Source { text: "emit -limit 5", class: Class::Bounded },
];

const OPS: &[Op] = &[
    Op { text: "put a = 1", blocking: false, effect: Effect::Keep },
    Op { text: "filter a > 0", blocking: false, effect: Effect::Keep },
    Op { text: "keep a", blocking: false, effect: Effect::Keep },
    Op { text: "head 3", blocking: false, effect: Effect::Keep },
    Op { text: "reduce -every :1s: count()", blocking: false, effect: Effect::Keep },
    Op { text: "batch :1s:", blocking: false, effect: Effect::Window },
    Op { text: "batch -every :10s:", blocking: false, effect: Effect::Window },
    Op { text: "unbatch", blocking: false, effect: Effect::Unwindow },
    Op { text: "reduce count()", blocking: true, effect: Effect::Keep },
    Op { text: "sort a", blocking: true, effect: Effect::Keep },
    Op { text: "tail 2", blocking: true, effect: Effect::Keep },
];

#[derive(Debug, Clone)]
struct Chain {
    source: Source,
    ops: Vec<Op>,
}

impl Chain {
    fn text(&self) -> String {
        let mut text = self.source.text.to_string();
        for op in &self.ops {
            text.push_str(" | ");
            text.push_str(op.text);
        }
        text
    }

    /// Whether the model predicts a runaway.
    fn is_runaway(&self) -> bool {
        let mut class = self.source.class;
        for op in &self.ops {
            if op.blocking && class == Class::Unbounded {
                return true;
            }
            class = match (op.effect, class) {
                (Effect::Keep, c) => c,
                (Effect::Window, Class::Bounded) => Class::Bounded,
                (Effect::Window, _) => Class::Windowed,
                (Effect::Unwindow, Class::Windowed) => Class::Unbounded,
                (Effect::Unwindow, c) => c,
            };
        }
        false
    }
}

// ── Generators ──────────────────────────────────────────────────────────────

fn arb_source() -> impl Strategy<Value = Source> {
    prop::sample::select(SOURCES)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop::sample::select(OPS)
}

fn arb_chain() -> impl Strategy<Value = Chain> {
    (arb_source(), prop::collection::vec(arb_op(), 0..8))
        .prop_map(|(source, ops)| Chain { source, ops })
}

/// Chains whose operators never block.
fn arb_non_blocking_chain() -> impl Strategy<Value = Chain> {
    let op = arb_op().prop_filter("non-blocking", |op| !op.blocking);
    (arb_source(), prop::collection::vec(op, 0..8))
        .prop_map(|(source, ops)| Chain { source, ops })
}

fn arb_bounded_chain() -> impl Strategy<Value = Chain> {
    let source = arb_source().prop_filter("bounded", |s| s.class == Class::Bounded);
    (source, prop::collection::vec(arb_op(), 0..8))
        .prop_map(|(source, ops)| Chain { source, ops })
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    /// The verdict agrees with the reference model, and rejections blame the
    /// chain's source.
    #[test]
    fn verdict_matches_model(chain in arb_chain()) {
        let text = chain.text();
        match compile_str(&text) {
            Ok(_) => {
                prop_assert!(!chain.is_runaway(), "accepted runaway program: {}", text);
            }
            Err(CompileError::Runaway(err)) => {
                prop_assert!(chain.is_runaway(), "rejected safe program: {}", text);
                prop_assert_eq!(err.info.location.start.offset, 0);
                prop_assert_eq!(err.info.location.end.offset, chain.source.text.len() + 1);
            }
            Err(other) => {
                prop_assert!(false, "front-end error for {}: {:?}", text, other);
            }
        }
    }

    #[test]
    fn non_blocking_chains_are_accepted(chain in arb_non_blocking_chain()) {
        let text = chain.text();
        prop_assert!(compile_str(&text).is_ok(), "rejected: {}", text);
    }

    #[test]
    fn bounded_sources_are_accepted(chain in arb_bounded_chain()) {
        let text = chain.text();
        prop_assert!(compile_str(&text).is_ok(), "rejected: {}", text);
    }

    /// Replacing every blocking operator with `head` yields an accepted program.
    #[test]
    fn head_is_exempt(chain in arb_chain()) {
        let head = Op { text: "head 1", blocking: false, effect: Effect::Keep };
        let exempt = Chain {
            source: chain.source,
            ops: chain.ops.iter().map(|op| if op.blocking { head } else { *op }).collect(),
        };
        let text = exempt.text();
        prop_assert!(compile_str(&text).is_ok(), "rejected: {}", text);
    }

    #[test]
    fn analysis_is_idempotent(chain in arb_chain()) {
        if let Ok(graph) = compile_str(&chain.text()) {
            let again = analyze(graph.clone());
            prop_assert_eq!(again, Ok(graph));
        }
    }

    #[test]
    fn analysis_is_deterministic(chain in arb_chain()) {
        let text = chain.text();
        prop_assert_eq!(compile_str(&text), compile_str(&text));
    }

    /// Any unsafe chain rejects the program; the first one is reported.
    #[test]
    fn one_unsafe_chain_rejects_the_program(
        chains in prop::collection::vec(arb_chain(), 1..5)
    ) {
        let text = chains
            .iter()
            .map(Chain::text)
            .collect::<Vec<_>>()
            .join(";\n");
        let first_unsafe = chains.iter().position(Chain::is_runaway);
        match (compile_str(&text), first_unsafe) {
            (Ok(_), None) => {}
            (Err(CompileError::Runaway(err)), Some(index)) => {
                prop_assert_eq!(err.info.location.start.line as usize, index + 1);
                prop_assert_eq!(err.info.location.start.column, 1);
            }
            (other, expected) => {
                prop_assert!(
                    false,
                    "program:\n{}\nexpected unsafe chain {:?}, got {:?}",
                    text,
                    expected,
                    other
                );
            }
        }
    }
}
