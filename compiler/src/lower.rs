// lower.rs — Proc lowering & option verification
//
// Lowers the parsed program to typed operators: each proc becomes an
// `OpKind` plus strongly typed `OpOptions`, and every option is checked
// against the proc's accepted set before the graph is built.
//
// Preconditions: program parsed without errors.
// Postconditions: `LoweredProgram` mirrors the AST shape (chains and parallel
//   blocks); every operator has a known kind and parsed options.
// Failure modes: unknown procs, bad option names/values and missing arguments
//   produce diagnostics; `LowerResult::has_errors()` reports them.
// Side effects: none.

use std::collections::HashSet;
use std::time::Duration;

use crate::ast::{Element, Expr, Flowgraph, ProcCall, ProcOption, Program, Span};
use crate::classify::OpKind;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::options::{parse_duration, Moment, OpOptions};

// ── Output types ────────────────────────────────────────────────────────────

/// Result of lowering.
#[derive(Debug)]
pub struct LowerResult {
    pub lowered: LoweredProgram,
    pub diagnostics: Vec<Diagnostic>,
}

impl LowerResult {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoweredProgram {
    pub flowgraphs: Vec<LoweredFlowgraph>,
}

/// One `|` chain. Stages keep source order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredFlowgraph {
    pub stages: Vec<Stage>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Op(Operator),
    /// Branches run side by side between the previous and next stage.
    Parallel(Vec<LoweredFlowgraph>),
}

/// A proc occurrence with its classification-relevant data.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    /// Proc name as written (`read`, `reduce`, ...).
    pub name: String,
    pub kind: OpKind,
    pub options: OpOptions,
    /// Proc span including trailing whitespace and comments.
    pub span: Span,
}

// ── Proc table ──────────────────────────────────────────────────────────────

/// Which `-options` a proc accepts.
#[derive(Debug, Clone, Copy)]
enum Accepts {
    Only(&'static [&'static str]),
    /// Adapter- or view-specific options are passed through unchecked.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Args {
    None,
    Optional,
    Required(&'static str),
}

struct ProcSpec {
    accepts: Accepts,
    args: Args,
}

fn proc_spec(name: &str) -> Option<ProcSpec> {
    let (accepts, args) = match name {
        "read" => (Accepts::Any, Args::Required("an adapter name")),
        "emit" => (
            Accepts::Only(&["from", "to", "last", "every", "limit", "hz", "points"]),
            Args::None,
        ),
        "batch" => (Accepts::Only(&["every", "on"]), Args::Optional),
        "reduce" => (
            Accepts::Only(&["every", "over", "on", "forget", "from", "to"]),
            Args::Required("at least one reducer"),
        ),
        "sort" => (
            Accepts::Only(&["limit", "groupby"]),
            Args::Required("at least one field"),
        ),
        "head" | "tail" => (Accepts::Only(&[]), Args::Optional),
        "unbatch" | "merge" => (Accepts::Only(&[]), Args::None),
        "put" => (Accepts::Only(&["over"]), Args::Required("at least one assignment")),
        "filter" => (Accepts::Only(&[]), Args::Required("a filter expression")),
        "keep" | "remove" => (Accepts::Only(&[]), Args::Required("at least one field")),
        "uniq" | "pass" => (Accepts::Only(&[]), Args::Optional),
        "view" | "write" => (Accepts::Any, Args::Required("a view name")),
        _ => return None,
    };
    Some(ProcSpec { accepts, args })
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Lower a parsed program to typed operators.
pub fn lower_program(program: &Program) -> LowerResult {
    let mut engine = LowerEngine {
        diagnostics: Vec::new(),
    };
    let flowgraphs = program
        .flowgraphs
        .iter()
        .map(|fg| engine.lower_flowgraph(fg))
        .collect();
    LowerResult {
        lowered: LoweredProgram { flowgraphs },
        diagnostics: engine.diagnostics,
    }
}

// ── Lowering engine ─────────────────────────────────────────────────────────

struct LowerEngine {
    diagnostics: Vec<Diagnostic>,
}

impl LowerEngine {
    fn lower_flowgraph(&mut self, fg: &Flowgraph) -> LoweredFlowgraph {
        let mut stages = Vec::with_capacity(fg.elements.len());
        for element in &fg.elements {
            match element {
                Element::Proc(call) => {
                    if let Some(op) = self.lower_proc(call) {
                        stages.push(Stage::Op(op));
                    }
                }
                Element::Parallel(block) => {
                    let branches = block
                        .branches
                        .iter()
                        .map(|b| self.lower_flowgraph(b))
                        .collect();
                    stages.push(Stage::Parallel(branches));
                }
            }
        }
        LoweredFlowgraph {
            stages,
            span: fg.span,
        }
    }

    fn lower_proc(&mut self, call: &ProcCall) -> Option<Operator> {
        let name = call.name.name.as_str();
        let Some(spec) = proc_spec(name) else {
            self.error(
                codes::UNKNOWN_PROC,
                call.name.span,
                format!("unknown proc `{name}`"),
            );
            return None;
        };

        self.check_option_names(call, spec.accepts);
        self.check_args(call, spec.args);

        let mut options = self.parse_options(call);
        if options.last.is_some() && (options.from.is_some() || options.to.is_some()) {
            let span = call.option("last").map_or(call.span, |o| o.span);
            self.error(
                codes::INCOMPATIBLE_OPTIONS,
                span,
                format!("`{name}`: -last cannot be combined with -from or -to"),
            );
        }

        let kind = match name {
            "read" | "emit" => OpKind::Source,
            "batch" => {
                self.lower_batch_interval(call, &mut options);
                OpKind::WindowedAggregate
            }
            "reduce" => {
                if call.option("over").is_some() && options.every.is_none() {
                    self.error(
                        codes::MISSING_OPTION,
                        call.span,
                        "reduce -over requires -every",
                    );
                }
                if options.every.is_some() {
                    OpKind::PeriodicAggregate
                } else {
                    OpKind::Aggregate
                }
            }
            "sort" => OpKind::Sort,
            "head" | "tail" => {
                options.limit = Some(self.count_arg(call).unwrap_or(1));
                if name == "head" {
                    OpKind::Head
                } else {
                    OpKind::Tail
                }
            }
            "unbatch" => OpKind::Unbatch,
            "merge" => OpKind::Merge,
            "view" | "write" => {
                self.check_file_view(call);
                OpKind::Sink
            }
            _ => OpKind::PassThrough,
        };

        Some(Operator {
            name: name.to_string(),
            kind,
            options,
            span: call.span,
        })
    }

    // ── Checks ──────────────────────────────────────────────────────────

    fn check_option_names(&mut self, call: &ProcCall, accepts: Accepts) {
        let mut seen = HashSet::new();
        for opt in &call.options {
            let opt_name = opt.name.name.as_str();
            if !seen.insert(opt_name) {
                self.error(
                    codes::DUPLICATE_OPTION,
                    opt.span,
                    format!("`{}`: option -{opt_name} given more than once", call.name.name),
                );
                continue;
            }
            if let Accepts::Only(allowed) = accepts {
                if !allowed.contains(&opt_name) {
                    self.error(
                        codes::UNKNOWN_OPTION,
                        opt.name.span,
                        format!("`{}` does not accept option -{opt_name}", call.name.name),
                    );
                }
            }
        }
    }

    fn check_args(&mut self, call: &ProcCall, rule: Args) {
        let name = &call.name.name;
        match rule {
            Args::Required(what) if call.args.is_empty() => {
                self.error(
                    codes::MISSING_ARGUMENT,
                    call.span,
                    format!("`{name}` requires {what}"),
                );
            }
            Args::None if !call.args.is_empty() => {
                self.error(
                    codes::INVALID_ARGUMENT,
                    call.args[0].span(),
                    format!("`{name}` takes no arguments"),
                );
            }
            _ => {}
        }
    }

    /// `view file` / `write file` must name the output file.
    fn check_file_view(&mut self, call: &ProcCall) {
        let is_file = matches!(call.args.first(), Some(Expr::Ident(id)) if id.name == "file");
        if is_file && call.option("filename").is_none() {
            self.error(
                codes::MISSING_OPTION,
                call.span,
                "File views require a -filename argument",
            );
        }
    }

    /// `batch :1s:` is shorthand for `batch -every :1s:`.
    fn lower_batch_interval(&mut self, call: &ProcCall, options: &mut OpOptions) {
        match (call.args.first(), options.every) {
            (Some(arg), Some(_)) => {
                self.error(
                    codes::INCOMPATIBLE_OPTIONS,
                    arg.span(),
                    "batch interval given both positionally and with -every",
                );
            }
            (Some(arg), None) => {
                options.every = self.duration_value("batch", "interval", arg);
            }
            (None, Some(_)) => {}
            (None, None) => {
                self.error(
                    codes::MISSING_OPTION,
                    call.span,
                    "batch requires an interval (`batch :1s:` or `batch -every :1s:`)",
                );
            }
        }
    }

    /// Optional non-negative integer count of `head`/`tail`.
    fn count_arg(&mut self, call: &ProcCall) -> Option<u64> {
        let arg = call.args.first()?;
        if let Some(extra) = call.args.get(1) {
            self.error(
                codes::INVALID_ARGUMENT,
                extra.span(),
                format!("`{}` takes at most one argument", call.name.name),
            );
        }
        match arg {
            Expr::Number(n, _) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
            other => {
                self.error(
                    codes::INVALID_ARGUMENT,
                    other.span(),
                    format!("`{}` count must be a non-negative integer", call.name.name),
                );
                None
            }
        }
    }

    // ── Option values ───────────────────────────────────────────────────

    fn parse_options(&mut self, call: &ProcCall) -> OpOptions {
        let mut options = OpOptions::default();
        let name = call.name.name.as_str();
        for opt in &call.options {
            match opt.name.name.as_str() {
                "from" => {
                    options.from = self.moment_value(name, opt);
                    if options.from == Some(Moment::End) {
                        self.error(
                            codes::INVALID_OPTION_VALUE,
                            opt.value.span(),
                            format!("`{name}`: -from cannot be :end:"),
                        );
                    }
                }
                "to" => options.to = self.moment_value(name, opt),
                "last" => options.last = self.duration_value(name, "-last", &opt.value),
                "every" => options.every = self.duration_value(name, "-every", &opt.value),
                "limit" => options.limit = self.limit_value(name, opt),
                _ => {}
            }
        }
        options
    }

    fn moment_value(&mut self, proc: &str, opt: &ProcOption) -> Option<Moment> {
        let parsed = match &opt.value {
            Expr::Moment(text, _) => Moment::parse(text),
            _ => None,
        };
        if parsed.is_none() {
            self.error(
                codes::INVALID_OPTION_VALUE,
                opt.value.span(),
                format!("`{proc}`: -{} expects a moment such as :now:", opt.name.name),
            );
        }
        parsed
    }

    fn duration_value(&mut self, proc: &str, what: &str, value: &Expr) -> Option<Duration> {
        let parsed = match value {
            Expr::Moment(text, _) => parse_duration(text).filter(|d| !d.is_zero()),
            _ => None,
        };
        if parsed.is_none() {
            self.error(
                codes::INVALID_OPTION_VALUE,
                value.span(),
                format!("`{proc}`: {what} expects a positive duration such as :1s:"),
            );
        }
        parsed
    }

    fn limit_value(&mut self, proc: &str, opt: &ProcOption) -> Option<u64> {
        match opt.value {
            Expr::Number(n, _) if n >= 0.0 && n.fract() == 0.0 => Some(n as u64),
            _ => {
                self.error(
                    codes::INVALID_OPTION_VALUE,
                    opt.value.span(),
                    format!("`{proc}`: -limit expects a non-negative integer"),
                );
                None
            }
        }
    }

    fn error(&mut self, code: DiagCode, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(code, span, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lower_src(source: &str) -> LowerResult {
        let parsed = parse(source);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        lower_program(&parsed.program.expect("program"))
    }

    fn ops(source: &str) -> Vec<Operator> {
        let result = lower_src(source);
        assert!(
            !result.has_errors(),
            "unexpected diagnostics: {:#?}",
            result.diagnostics
        );
        result.lowered.flowgraphs[0]
            .stages
            .iter()
            .map(|s| match s {
                Stage::Op(op) => op.clone(),
                Stage::Parallel(_) => panic!("unexpected parallel stage"),
            })
            .collect()
    }

    fn codes_of(source: &str) -> Vec<&'static str> {
        lower_src(source)
            .diagnostics
            .iter()
            .filter_map(|d| d.code.map(|c| c.0))
            .collect()
    }

    #[test]
    fn kinds_of_a_typical_chain() {
        let kinds: Vec<OpKind> = ops(
            r#"read test -key "foo" -to :end: | batch -every :1s: | reduce count() | put a = 1 | view table"#,
        )
        .iter()
        .map(|op| op.kind)
        .collect();
        assert_eq!(
            kinds,
            vec![
                OpKind::Source,
                OpKind::WindowedAggregate,
                OpKind::Aggregate,
                OpKind::PassThrough,
                OpKind::Sink,
            ]
        );
    }

    #[test]
    fn source_options_are_parsed() {
        let read = &ops("read test -from :0: -to :end: | view table")[0];
        assert_eq!(read.options.from, Some(Moment::Absolute(0)));
        assert_eq!(read.options.to, Some(Moment::End));
        let last = &ops("read test -last :1m: | view table")[0];
        assert_eq!(last.options.last, Some(Duration::from_secs(60)));
    }

    #[test]
    fn reduce_every_is_periodic() {
        let chain = ops("emit | reduce -every :1s: count()");
        assert_eq!(chain[1].kind, OpKind::PeriodicAggregate);
        assert_eq!(chain[1].options.every, Some(Duration::from_secs(1)));
    }

    #[test]
    fn positional_batch_interval() {
        let chain = ops("emit | batch :2s: | reduce count()");
        assert_eq!(chain[1].options.every, Some(Duration::from_secs(2)));
    }

    #[test]
    fn head_and_tail_counts() {
        let chain = ops("emit | head 5 | tail");
        assert_eq!((chain[1].kind, chain[1].options.limit), (OpKind::Head, Some(5)));
        assert_eq!((chain[2].kind, chain[2].options.limit), (OpKind::Tail, Some(1)));
    }

    #[test]
    fn parallel_branches_are_lowered() {
        let result = lower_src("emit | (head 1; tail 1) | merge | view table");
        assert!(!result.has_errors());
        let Stage::Parallel(branches) = &result.lowered.flowgraphs[0].stages[1] else {
            panic!("expected parallel stage")
        };
        assert_eq!(branches.len(), 2);
    }

    #[test]
    fn unknown_proc() {
        assert_eq!(codes_of("emit | frobnicate"), vec!["UNKNOWN-PROC"]);
    }

    #[test]
    fn unknown_and_duplicate_options() {
        assert_eq!(codes_of("emit -bogus 1 | view table"), vec!["UNKNOWN-OPTION"]);
        assert_eq!(
            codes_of("emit -limit 1 -limit 2 | view table"),
            vec!["DUPLICATE-OPTION"]
        );
    }

    #[test]
    fn read_passes_adapter_options_through() {
        assert!(codes_of(r#"read elastic -index "x*" -id 3 -to :end: | view t"#).is_empty());
    }

    #[test]
    fn bad_option_values() {
        assert_eq!(codes_of("emit -from :end: | view t"), vec!["INVALID-OPTION-VALUE"]);
        assert_eq!(codes_of("emit -to 5 | view t"), vec!["INVALID-OPTION-VALUE"]);
        assert_eq!(codes_of("emit -every :0s: | view t"), vec!["INVALID-OPTION-VALUE"]);
        assert_eq!(codes_of("emit -limit -3 | view t"), vec!["INVALID-OPTION-VALUE"]);
        assert_eq!(
            codes_of("read x -from :9999999999999999-01-01: -to :now: | tail 1"),
            vec!["INVALID-OPTION-VALUE"]
        );
    }

    #[test]
    fn last_is_incompatible_with_explicit_bounds() {
        assert_eq!(
            codes_of("read test -last :1h: -to :now: | view t"),
            vec!["INCOMPATIBLE-OPTIONS"]
        );
    }

    #[test]
    fn missing_arguments_and_options() {
        assert_eq!(codes_of("read -to :end: | view t"), vec!["MISSING-ARGUMENT"]);
        assert_eq!(codes_of("emit | batch | view t"), vec!["MISSING-OPTION"]);
        assert_eq!(codes_of("emit | reduce -over :1m: count()"), vec!["MISSING-OPTION"]);
        assert_eq!(codes_of("emit | sort"), vec!["MISSING-ARGUMENT"]);
    }

    #[test]
    fn file_views_require_filename() {
        let result = lower_src("emit | view file");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(
            result.diagnostics[0].message,
            "File views require a -filename argument"
        );
        assert!(codes_of(r#"emit | write file -filename "out.json""#).is_empty());
    }

    #[test]
    fn invalid_counts() {
        assert_eq!(codes_of("emit | head 1.5"), vec!["INVALID-ARGUMENT"]);
        assert_eq!(codes_of("emit | unbatch 3"), vec!["INVALID-ARGUMENT"]);
    }
}
