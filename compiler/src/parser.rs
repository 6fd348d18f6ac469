// Parser for flowgraph query programs.
//
// Parses a token stream (from the lexer) into an AST. Uses chumsky
// combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a program. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

/// A proc item before options and arguments are split apart.
enum ProcItem {
    Option(ProcOption),
    Arg(Expr),
}

/// Extend `end` over the trivia that follows it (whitespace and `//`
/// comments, as the lexer skips them), so a proc's span runs up to the next
/// token (`|`, `;`, `)`) or the end of the text.
fn extend_over_trivia(source: &str, end: usize) -> usize {
    let mut rest = &source[end..];
    loop {
        rest = rest.trim_start();
        match rest.strip_prefix("//") {
            Some(comment) => rest = comment.find('\n').map_or("", |nl| &comment[nl..]),
            None => break,
        }
    }
    source.len() - rest.len()
}

// ── Main parser builder ──
//
// All grammar rules are built inside `program_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Expressions ──

    let expr = recursive(|expr| {
        let literal = select! {
            Token::Number(n) = e => Expr::Number(n, e.span()),
            Token::StringLit(s) = e => Expr::StringLit(s, e.span()),
            Token::Moment(m) = e => Expr::Moment(m, e.span()),
        };

        let call = ident
            .clone()
            .then(
                expr.separated_by(just(Token::Comma))
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map_with(|(name, args), e| Expr::Call {
                name,
                args,
                span: e.span(),
            });

        let term = literal.or(call).or(ident.clone().map(Expr::Ident));

        let cmp_op = select! {
            Token::Equals => CmpOp::Assign,
            Token::EqEq => CmpOp::Eq,
            Token::NotEq => CmpOp::Ne,
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
        };

        term.clone()
            .then(cmp_op.then(term).or_not())
            .map_with(|(lhs, rhs), e| match rhs {
                Some((op, rhs)) => Expr::Compare {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                    span: e.span(),
                },
                None => lhs,
            })
    });

    // ── Proc: IDENT (option | expr ','?)* ──

    let option = select! {
        Token::OptName(name) = e => Ident { name, span: e.span() },
    }
    .then(expr.clone())
    .map_with(|(name, value), e| {
        ProcItem::Option(ProcOption {
            name,
            value,
            span: e.span(),
        })
    });

    let item = option
        .or(expr.map(ProcItem::Arg))
        .then_ignore(just(Token::Comma).or_not());

    let proc_call = ident
        .clone()
        .then(item.repeated().collect::<Vec<_>>())
        .map_with(move |(name, items), e| {
            let span: SimpleSpan = e.span();
            let end = extend_over_trivia(source, span.end());
            let mut options = Vec::new();
            let mut args = Vec::new();
            for item in items {
                match item {
                    ProcItem::Option(opt) => options.push(opt),
                    ProcItem::Arg(arg) => args.push(arg),
                }
            }
            ProcCall {
                name,
                options,
                args,
                span: (span.start()..end).into(),
            }
        });

    // ── Flowgraph: element ('|' element)*, with parallel blocks ──

    let flowgraph = recursive(|flowgraph| {
        let parallel = flowgraph
            .separated_by(just(Token::Semi))
            .allow_trailing()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map_with(|branches, e| {
                Element::Parallel(ParallelBlock {
                    branches,
                    span: e.span(),
                })
            });

        let element = proc_call.clone().map(Element::Proc).or(parallel);

        element
            .separated_by(just(Token::Pipe))
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|elements, e| Flowgraph {
                elements,
                span: e.span(),
            })
    });

    // ── Program ──

    flowgraph
        .separated_by(just(Token::Semi))
        .allow_trailing()
        .collect::<Vec<_>>()
        .map_with(|flowgraphs, e| Program {
            flowgraphs,
            span: e.span(),
        })
}

// ── Tests ──
