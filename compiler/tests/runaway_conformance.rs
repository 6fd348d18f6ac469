// Conformance tests for the runaway check.
//
// Each case compiles a complete program through the public `compile_str`
// entry point and checks the verdict: accepted graphs come back unchanged,
// rejected ones carry RUNAWAY-PROGRAM and the location of the live source
// that causes the unbounded buffering.

use flowc::source::{Location, Position};
use flowc::{compile_str, CompileError, RunawayError};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn accept(text: &str) {
    if let Err(e) = compile_str(text) {
        panic!("expected `{text}` to be accepted, got {e:?}");
    }
}

fn reject(text: &str) -> RunawayError {
    match compile_str(text) {
        Err(CompileError::Runaway(err)) => {
            assert_eq!(err.code, "RUNAWAY-PROGRAM");
            err
        }
        other => panic!("expected `{text}` to be a runaway program, got {other:?}"),
    }
}

/// Byte offset of the first occurrence of `needle`.
fn offset_of(text: &str, needle: &str) -> usize {
    text.find(needle)
        .unwrap_or_else(|| panic!("`{needle}` not in `{text}`"))
}

// ── Reference scenarios ─────────────────────────────────────────────────────

#[test]
fn live_tail_is_rejected_at_the_read() {
    let err = reject(r#"read test -key "foo" -to :end: | tail 1 "#);
    assert_eq!(
        err.info.location,
        Location {
            filename: "main".into(),
            start: Position {
                line: 1,
                column: 1,
                offset: 0
            },
            end: Position {
                line: 1,
                column: 32,
                offset: 31
            },
        }
    );
    assert!(err.message.contains("`tail`"), "{}", err.message);
}

#[test]
fn live_tail_location_serializes_verbatim() {
    let err = reject(r#"read test -key "foo" -to :end: | tail 1 "#);
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(
        json["info"]["location"],
        serde_json::json!({
            "filename": "main",
            "start": { "line": 1, "column": 1, "offset": 0 },
            "end": { "line": 1, "column": 32, "offset": 31 }
        })
    );
    assert_eq!(json["code"], "RUNAWAY-PROGRAM");
}

#[test]
fn batched_tail_is_accepted() {
    accept("read test -to :end: | batch -every :1s: | tail 1");
}

#[test]
fn periodic_reduce_then_plain_reduce_is_rejected() {
    let err = reject("read test -to :end: | reduce -every :1s: m = count() | reduce max(m)");
    assert_eq!(err.info.location.start.offset, 0);
    assert!(err.message.contains("`reduce`"));
}

#[test]
fn live_head_is_accepted() {
    accept("read test -to :end: | head 1");
}

#[test]
fn one_unsafe_chain_rejects_the_program() {
    let text = "read test -to :end: | reduce count() | view results1;\n\
                read test -last :1m: | reduce count() | view results2";
    let err = reject(text);
    assert_eq!(err.info.location.start.line, 1);
    assert_eq!(err.info.location.start.offset, 0);
}

#[test]
fn unsafe_chain_is_found_after_a_safe_one() {
    let text = "read test -last :1m: | reduce count() | view results2;\n\
                read test -to :end: | reduce count() | view results1";
    let err = reject(text);
    assert_eq!(err.info.location.start.line, 2);
    assert_eq!(err.info.location.start.column, 1);
}

#[test]
fn historical_reduce_is_accepted() {
    accept("read test -to :now: | reduce count()");
}

// ── Superqueries and windowing ──────────────────────────────────────────────

#[test]
fn superquery_into_tail_is_rejected() {
    reject("read test -from :0: -to :end: | tail 1");
}

#[test]
fn superquery_into_sort_is_rejected() {
    reject("read test -from :0: -to :end: | sort time");
}

#[test]
fn put_then_batch_then_sort_is_accepted() {
    accept("read test -to :end: | put field = count() | batch -every :1s: | sort field");
}

#[test]
fn periodic_reduce_alone_is_accepted() {
    accept("read test -to :end: | reduce -every :1s: count()");
}

#[test]
fn positional_batch_then_reduce_is_accepted() {
    accept("read test -to :end: | batch :1s: | reduce count()");
}

#[test]
fn multi_level_pass_through_chain_is_rejected() {
    let text = "read test -to :end: | put a = 1 | filter a > 0 | reduce count() | put b = 2";
    let err = reject(text);
    assert_eq!(err.info.location.start.offset, 0);
    assert_eq!(err.info.location.end.offset, offset_of(text, "|"));
}

#[test]
fn unbatch_restores_an_unbounded_stream() {
    reject("read test -to :end: | batch :1s: | unbatch | tail 1");
}

#[test]
fn windowed_source_feeds_blocking_operators() {
    accept("read test -to :end: -every :10s: | reduce count() | sort count");
}

#[test]
fn bounded_sources_are_always_safe() {
    accept("read test -last :1h: | sort time | tail 10");
    accept("read test -from :2014-01-01: -to :2014-02-01: | reduce count()");
    accept("emit -limit 10 | sort time");
    accept("emit | tail 1");
    accept("read test -to :end: -limit 100 | sort time");
}

#[test]
fn emit_to_end_is_live() {
    reject("emit -to :end: | sort time");
}

// ── Fan-out and merge ───────────────────────────────────────────────────────

#[test]
fn unsafe_parallel_branch_is_rejected() {
    reject("read test -to :end: | (head 5; tail 5) | view table");
}

#[test]
fn safe_parallel_branches_are_accepted() {
    accept("read test -to :end: | (head 5; batch :1s: | tail 5) | view table");
}

#[test]
fn merge_of_windowed_and_unbounded_blames_the_unbounded_source() {
    let text = "(read a -to :end: -every :1s:; read b -to :end:) | merge | sort x";
    let err = reject(text);
    assert_eq!(err.info.location.start.offset, offset_of(text, "read b"));
}

#[test]
fn merge_tie_blames_the_first_input() {
    let text = "(read a -to :end:; read b -to :end:) | merge | tail 1";
    let err = reject(text);
    assert_eq!(err.info.location.start.offset, offset_of(text, "read a"));
}

#[test]
fn merge_of_bounded_and_windowed_is_accepted() {
    accept("(read a -last :1h:; read b -to :end: -every :1s:) | merge | sort x");
}

// ── Analyzer contract ───────────────────────────────────────────────────────

#[test]
fn accepted_graph_is_returned_unchanged() {
    let graph = compile_str("read test -to :end: | batch :1s: | sort x | view t").unwrap();
    let again = flowc::analyze(graph.clone()).unwrap();
    assert_eq!(again, graph);
}

#[test]
fn verdict_is_repeatable() {
    let text = "read a -to :end: | sort x; read b -to :end: | tail 1";
    assert_eq!(reject(text), reject(text));
    assert_eq!(reject(text).info.location.start.offset, 0);
}
