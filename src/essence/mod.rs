//! Parsing of programs in a small Essence-like constraint modelling
//! language.
//!
//! A program declares decision variables with `find` statements and states a
//! single boolean constraint after `such that`:
//!
//! ```text
//! find x, y : int(1..10)
//! find b : bool
//! such that x + y <= 10 and min([x, y]) = 2 or b
//! ```
//!
//! [`parse`] turns a source buffer into an [`ast::Program`] in one pass, or
//! fails fast with the first [`ParseError`] it encounters. The AST renders
//! back to canonical surface syntax through [`Display`](std::fmt::Display),
//! and re-parsing that rendering yields a structurally identical program.
//!
//! # Example
//! ```
//! use essence_rs::ast::Domain;
//!
//! let program = essence_rs::parse("find x, y : int(1..10) such that min([x, y]) <= 3")
//!     .expect("valid program");
//!
//! assert_eq!(1, program.find_statements.len());
//! assert!(matches!(
//!     program.find_statements[0].node.domain.node,
//!     Domain::Int(_)
//! ));
//! assert_eq!(
//!     "find x, y : int(1..10)\nsuch that min([x, y]) <= 3",
//!     program.to_string()
//! );
//! ```

mod parser;
mod tokens;

pub use parser::MAX_EXPRESSION_DEPTH;
pub use tokens::Token;

use chumsky::error::Rich;
use chumsky::Parser;
use log::trace;

use crate::ast;
use crate::ast::Span;
use crate::error::ParseError;

/// Parses a whole program into an [`ast::Program`].
///
/// The input is consumed synchronously in a single pass; on failure the
/// first error is returned and no partial AST is produced. Independent
/// parses share no state and may run concurrently.
pub fn parse(source: &str) -> Result<ast::Program, ParseError> {
    let tokens = lex_tokens(source)?;
    trace!("lexed {} tokens from {} bytes of source", tokens.len(), source.len());

    let program = parser::Parser::new(&tokens, source.len()).parse_program()?;
    trace!("parsed {} find statements", program.find_statements.len());

    Ok(program)
}

/// Lexes the source into a spanned token sequence.
///
/// Fails with [`ParseError::LexError`] on the first character that cannot
/// start any token, and with [`ParseError::IntegerOverflow`] on an integer
/// literal that does not fit an `i64`.
pub fn lex(source: &str) -> Result<Vec<ast::Node<Token<'_>>>, ParseError> {
    let tokens = lex_tokens(source)?;

    for token in &tokens {
        match token.node {
            Token::Unknown(character) => {
                return Err(ParseError::LexError {
                    character,
                    span: token.span,
                });
            }

            Token::Integer(literal) if literal.parse::<i64>().is_err() => {
                return Err(ParseError::IntegerOverflow {
                    literal: literal.to_owned(),
                    span: token.span,
                });
            }

            _ => {}
        }
    }

    Ok(tokens)
}

/// Runs the lexer, keeping [`Token::Unknown`] tokens in the stream so the
/// parser can report them against the grammar position they occur at.
fn lex_tokens(source: &str) -> Result<Vec<ast::Node<Token<'_>>>, ParseError> {
    tokens::lex()
        .parse(source)
        .into_result()
        .map_err(|errors| convert_lex_errors(source, errors))
}

/// Maps chumsky's lex errors onto the error taxonomy, keeping only the
/// earliest one (fail-fast, single error reporting).
///
/// The token rule ends in a catch-all, so the lexer is not expected to fail;
/// this conversion exists so a failure still surfaces as a structured error.
fn convert_lex_errors(source: &str, errors: Vec<Rich<'_, char>>) -> ParseError {
    let Some(error) = errors.into_iter().min_by_key(|error| error.span().start) else {
        // chumsky reports at least one error on failure.
        return ParseError::SyntaxError {
            message: "lexing failed".to_owned(),
            span: Span { start: 0, end: 0 },
        };
    };

    let span = Span::from(*error.span());

    match source[span.start..].chars().next() {
        Some(character) => ParseError::LexError { character, span },
        None => ParseError::SyntaxError {
            message: "unexpected end of input".to_owned(),
            span,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::ast::AddOp;
    use crate::ast::CompOp;
    use crate::ast::Domain;
    use crate::ast::Factor;
    use crate::ast::MulOp;
    use crate::ast::Node;
    use crate::ast::Range;

    fn node<T>(start: usize, end: usize, data: T) -> Node<T> {
        Node {
            node: data,
            span: Span { start, end },
        }
    }

    /// A factor wrapped up to the addition tier, covering `start..end`.
    fn addition(start: usize, end: usize, factor: Factor) -> Node<ast::Addition> {
        node(
            start,
            end,
            ast::Addition {
                first: node(
                    start,
                    end,
                    ast::Term {
                        first: node(start, end, factor),
                        rest: vec![],
                    },
                ),
                rest: vec![],
            },
        )
    }

    /// A factor wrapped up to the comparison tier, covering `start..end`.
    fn comparison(start: usize, end: usize, factor: Factor) -> Node<ast::Comparison> {
        node(
            start,
            end,
            ast::Comparison {
                first: addition(start, end, factor),
                rest: vec![],
            },
        )
    }

    #[test]
    fn single_find_with_closed_range() {
        let program = parse("find x : int(1..3) such that x = 2").expect("valid program");

        let expected = ast::Program {
            find_statements: vec![node(
                5,
                18,
                ast::FindStatement {
                    variables: vec![node(5, 6, Rc::from("x"))],
                    domain: node(
                        9,
                        18,
                        Domain::Int(vec![node(13, 17, Range::Closed { lower: 1, upper: 3 })]),
                    ),
                },
            )],
            constraint: node(
                29,
                34,
                ast::Constraint {
                    negated: false,
                    expression: node(
                        29,
                        34,
                        ast::Expression {
                            disjuncts: vec![node(
                                29,
                                34,
                                ast::Conjunction {
                                    conjuncts: vec![node(
                                        29,
                                        34,
                                        ast::Comparison {
                                            first: addition(29, 30, Factor::Variable(Rc::from("x"))),
                                            rest: vec![(
                                                CompOp::Equal,
                                                addition(33, 34, Factor::Constant(2)),
                                            )],
                                        },
                                    )],
                                },
                            )],
                        },
                    ),
                },
            ),
        };

        assert_eq!(expected, program);
    }

    #[test]
    fn identifiers_sharing_one_domain() {
        let program = parse("find x, y : bool such that x and y").expect("valid program");

        let expected = ast::Program {
            find_statements: vec![node(
                5,
                16,
                ast::FindStatement {
                    variables: vec![node(5, 6, Rc::from("x")), node(8, 9, Rc::from("y"))],
                    domain: node(12, 16, Domain::Bool),
                },
            )],
            constraint: node(
                27,
                34,
                ast::Constraint {
                    negated: false,
                    expression: node(
                        27,
                        34,
                        ast::Expression {
                            disjuncts: vec![node(
                                27,
                                34,
                                ast::Conjunction {
                                    conjuncts: vec![
                                        comparison(27, 28, Factor::Variable(Rc::from("x"))),
                                        comparison(33, 34, Factor::Variable(Rc::from("y"))),
                                    ],
                                },
                            )],
                        },
                    ),
                },
            ),
        };

        assert_eq!(expected, program);
    }

    #[test]
    fn min_aggregate_in_a_comparison() {
        let program =
            parse("find x : int(1..3) such that min([x, x]) <= 2").expect("valid program");

        let aggregate = Factor::Min(vec![
            node(34, 35, Rc::from("x")),
            node(37, 38, Rc::from("x")),
        ]);

        let expected_constraint = node(
            29,
            45,
            ast::Constraint {
                negated: false,
                expression: node(
                    29,
                    45,
                    ast::Expression {
                        disjuncts: vec![node(
                            29,
                            45,
                            ast::Conjunction {
                                conjuncts: vec![node(
                                    29,
                                    45,
                                    ast::Comparison {
                                        first: addition(29, 40, aggregate),
                                        rest: vec![(
                                            CompOp::LessEqual,
                                            addition(44, 45, Factor::Constant(2)),
                                        )],
                                    },
                                )],
                            },
                        )],
                    },
                ),
            },
        );

        assert_eq!(expected_constraint, program.constraint);
    }

    #[test]
    fn missing_such_that_clause_is_a_syntax_error() {
        let error = parse("find x : int(1..3)").expect_err("missing such that");

        assert!(matches!(error, ParseError::SyntaxError { .. }));
        assert_eq!(Span { start: 18, end: 18 }, error.span());
        assert!(error.to_string().contains("'such that'"));
    }

    #[test]
    fn unbalanced_parenthesis_reports_the_opener() {
        let error = parse("find x : int(1..3) such that x + (y * 2").expect_err("unclosed group");

        assert_eq!(
            ParseError::UnclosedGroup {
                opener: "(".to_owned(),
                span: Span { start: 33, end: 34 },
            },
            error
        );
    }

    #[test]
    fn unknown_character_reports_the_expected_operators() {
        let error = parse("find x : int(1..3) such that x @ 2").expect_err("unknown character");

        let ParseError::UnexpectedToken {
            found,
            expected,
            span,
        } = error
        else {
            panic!("expected UnexpectedToken, got {error:?}");
        };

        assert_eq!("'@'", found);
        assert_eq!(Span { start: 31, end: 32 }, span);

        for operator in [
            "'='", "'!='", "'<='", "'>='", "'<'", "'>'", "'+'", "'-'", "'*'", "'/'", "'and'",
            "'or'",
        ] {
            assert!(
                expected.iter().any(|entry| entry == operator),
                "expected set is missing {operator}"
            );
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse("find a, b, c : int(0..9) such that a + b * c = 9")
            .expect("valid program");

        let comparison = &program.constraint.node.expression.node.disjuncts[0].node.conjuncts[0];
        let addition = &comparison.node.first.node;

        assert_eq!(1, addition.rest.len());
        let (op, term) = &addition.rest[0];
        assert_eq!(AddOp::Add, *op);

        // `b * c` is one term nested inside the addition.
        assert!(matches!(term.node.first.node, Factor::Variable(ref name) if &**name == "b"));
        assert_eq!(1, term.node.rest.len());
        assert_eq!(MulOp::Mul, term.node.rest[0].0);
    }

    #[test]
    fn chained_comparisons_are_kept_as_a_sequence() {
        let program = parse("find a, b, c : int such that a < b < c").expect("valid program");

        let comparison = &program.constraint.node.expression.node.disjuncts[0].node.conjuncts[0];

        assert_eq!(2, comparison.node.rest.len());
        assert_eq!(CompOp::Less, comparison.node.rest[0].0);
        assert_eq!(CompOp::Less, comparison.node.rest[1].0);
    }

    #[test]
    fn one_find_keyword_may_declare_several_statements() {
        let program =
            parse("find x : bool, y : int(1..2) such that x").expect("valid program");

        assert_eq!(2, program.find_statements.len());
        assert_eq!(Domain::Bool, program.find_statements[0].node.domain.node);
        assert!(matches!(
            program.find_statements[1].node.domain.node,
            Domain::Int(_)
        ));
    }

    #[test]
    fn bare_int_is_an_unbounded_domain() {
        let program = parse("find x : int such that x = 2").expect("valid program");

        assert_eq!(
            Domain::UnboundedInt,
            program.find_statements[0].node.domain.node
        );
    }

    #[test]
    fn range_list_variants() {
        let program =
            parse("find x : int(1..3, 5, 7.., ..9) such that x = 1").expect("valid program");

        let Domain::Int(ranges) = &program.find_statements[0].node.domain.node else {
            panic!("expected an int domain");
        };

        let ranges: Vec<Range> = ranges.iter().map(|range| range.node).collect();
        assert_eq!(
            vec![
                Range::Closed { lower: 1, upper: 3 },
                Range::Closed { lower: 5, upper: 5 },
                Range::LowerBound { lower: 7 },
                Range::UpperBound { upper: 9 },
            ],
            ranges
        );
    }

    #[test]
    fn empty_ranges_are_not_rejected_at_parse_time() {
        let program = parse("find x : int(3..1) such that x = 1").expect("valid program");

        let Domain::Int(ranges) = &program.find_statements[0].node.domain.node else {
            panic!("expected an int domain");
        };
        assert_eq!(Range::Closed { lower: 3, upper: 1 }, ranges[0].node);
    }

    #[test]
    fn constraint_can_be_negated() {
        let program = parse("find x : bool such that !x").expect("valid program");

        assert!(program.constraint.node.negated);
    }

    #[test]
    fn boolean_constants_are_factors() {
        let program = parse("find x : bool such that x = true").expect("valid program");

        let comparison = &program.constraint.node.expression.node.disjuncts[0].node.conjuncts[0];
        let (_, operand) = &comparison.node.rest[0];

        assert_eq!(Factor::Bool(true), operand.node.first.node.first.node);
    }

    #[test]
    fn trailing_commas_are_permitted() {
        // After the last declaration of a find block, after the last
        // aggregate variable, and after the constraint.
        let program =
            parse("find x : bool, such that min([x, ]) = x,").expect("valid program");

        assert_eq!(1, program.find_statements.len());

        let comparison = &program.constraint.node.expression.node.disjuncts[0].node.conjuncts[0];
        assert!(
            matches!(&comparison.node.first.node.first.node.first.node, Factor::Min(variables) if variables.len() == 1)
        );
    }

    #[test]
    fn comments_are_whitespace() {
        let source = "$ declares x\nfind x : bool $ trailing comment\nsuch that x";
        let program = parse(source).expect("valid program");

        assert_eq!(1, program.find_statements.len());
    }

    #[test]
    fn nesting_beyond_the_maximum_depth_is_rejected() {
        let mut source = String::from("find x : bool such that ");
        source.push_str(&"(".repeat(MAX_EXPRESSION_DEPTH + 72));
        source.push('x');
        source.push_str(&")".repeat(MAX_EXPRESSION_DEPTH + 72));

        let error = parse(&source).expect_err("nesting too deep");

        assert!(matches!(
            error,
            ParseError::NestingTooDeep {
                max_depth: MAX_EXPRESSION_DEPTH,
                ..
            }
        ));
        // The error points at the first opener beyond the limit.
        assert_eq!(
            Span {
                start: 24 + MAX_EXPRESSION_DEPTH,
                end: 24 + MAX_EXPRESSION_DEPTH + 1,
            },
            error.span()
        );
    }

    #[test]
    fn nesting_within_the_limit_parses() {
        let mut source = String::from("find x : bool such that ");
        source.push_str(&"(".repeat(50));
        source.push('x');
        source.push_str(&")".repeat(50));

        assert!(parse(&source).is_ok());
    }

    #[test]
    fn overflowing_integer_literal_is_reported() {
        let error = parse("find x : int(1..99999999999999999999) such that x = 1")
            .expect_err("overflowing literal");

        let ParseError::IntegerOverflow { literal, span } = error else {
            panic!("expected IntegerOverflow, got {error:?}");
        };

        assert_eq!("99999999999999999999", literal);
        assert_eq!(Span { start: 16, end: 36 }, span);
    }

    #[test]
    fn lex_rejects_unrecognized_characters() {
        let error = lex("x @ y").expect_err("unrecognized character");

        assert_eq!(
            ParseError::LexError {
                character: '@',
                span: Span { start: 2, end: 3 },
            },
            error
        );
    }

    #[test]
    fn lex_rejects_overflowing_literals() {
        let error = lex("x = 99999999999999999999").expect_err("overflowing literal");

        assert_eq!(
            ParseError::IntegerOverflow {
                literal: "99999999999999999999".to_owned(),
                span: Span { start: 4, end: 24 },
            },
            error
        );
    }

    #[test]
    fn lex_produces_the_token_sequence() {
        let tokens = lex("find x : bool such that x").expect("lexable source");

        assert_eq!(
            vec![
                Token::Find,
                Token::Ident("x"),
                Token::Colon,
                Token::Bool,
                Token::SuchThat,
                Token::Ident("x"),
            ],
            tokens.iter().map(|token| token.node).collect::<Vec<_>>()
        );
    }

    #[test]
    fn empty_input_expects_a_find_statement() {
        let error = parse("").expect_err("empty program");

        assert!(matches!(error, ParseError::SyntaxError { .. }));
        assert_eq!(Span { start: 0, end: 0 }, error.span());
        assert!(error.to_string().contains("'find'"));
    }

    #[test]
    fn program_without_declarations_is_rejected() {
        let error = parse("such that x").expect_err("no find statements");

        assert!(matches!(error, ParseError::SyntaxError { .. }));
        assert_eq!(Span { start: 0, end: 9 }, error.span());
    }

    #[test]
    fn trailing_tokens_after_the_constraint_are_rejected() {
        let error = parse("find x : bool such that x find").expect_err("trailing input");

        let ParseError::SyntaxError { message, span } = error else {
            panic!("expected SyntaxError, got {error:?}");
        };

        assert_eq!(Span { start: 26, end: 30 }, span);
        assert!(message.contains("trailing input"));
    }

    #[test]
    fn empty_aggregate_is_rejected() {
        let error = parse("find x : bool such that min([]) = x").expect_err("empty aggregate");

        let ParseError::UnexpectedToken { found, expected, .. } = error else {
            panic!("expected UnexpectedToken, got {error:?}");
        };

        assert_eq!("'])'", found);
        assert!(expected.iter().any(|entry| entry == "identifier"));
    }

    #[test]
    fn bound_less_range_entry_is_rejected() {
        let error = parse("find x : int(..) such that x = 1").expect_err("bare '..'");

        let ParseError::UnexpectedToken { found, expected, .. } = error else {
            panic!("expected UnexpectedToken, got {error:?}");
        };

        assert_eq!("')'", found);
        assert_eq!(vec!["integer literal".to_owned()], expected);
    }

    #[test]
    fn unclosed_aggregate_reports_the_opener() {
        let error = parse("find x : bool such that min([x").expect_err("unclosed aggregate");

        assert_eq!(
            ParseError::UnclosedGroup {
                opener: "min([".to_owned(),
                span: Span { start: 24, end: 29 },
            },
            error
        );
    }

    #[test]
    fn unclosed_domain_parenthesis_reports_the_opener() {
        let error = parse("find x : int(1..3").expect_err("unclosed domain");

        assert_eq!(
            ParseError::UnclosedGroup {
                opener: "(".to_owned(),
                span: Span { start: 12, end: 13 },
            },
            error
        );
    }

    #[test]
    fn error_position_is_at_or_before_the_fault() {
        // The reported position never lies past the offending token.
        let cases = [
            ("find x : int(1..3) such that x = ", 33),
            ("find x : int(1..3) such that = 2", 29),
            ("find , : bool such that x", 5),
            ("find x : such that x", 9),
        ];

        for (source, fault_position) in cases {
            let error = parse(source).expect_err("malformed input");
            assert!(
                error.span().start <= fault_position,
                "error for {source:?} reported at {} which is past {fault_position}",
                error.span().start
            );
        }
    }
}
