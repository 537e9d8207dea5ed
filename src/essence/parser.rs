use std::collections::BTreeSet;
use std::rc::Rc;

use crate::ast;
use crate::ast::Node;
use crate::ast::Span;
use crate::error::ParseError;

use super::tokens::Token;

/// The maximum nesting depth of `(`, `min([` and `max([` groups.
///
/// The expression grammar recurses through parenthesized sub-expressions, so
/// parser recursion is bounded by input nesting. Inputs that nest deeper than
/// this fail with [`ParseError::NestingTooDeep`] instead of exhausting the
/// call stack.
pub const MAX_EXPRESSION_DEPTH: usize = 128;

/// The token kinds that can start a factor.
const FACTOR_STARTS: &[&str] = &[
    "identifier",
    "integer literal",
    "'true'",
    "'false'",
    "'('",
    "'min(['",
    "'max(['",
];

/// The token kinds that may follow a complete constraint expression.
const EXPRESSION_CONTINUATIONS: &[&str] = &[
    "'or'",
    "'and'",
    "'='",
    "'!='",
    "'<='",
    "'>='",
    "'<'",
    "'>'",
    "'+'",
    "'-'",
    "'*'",
    "'/'",
    "','",
    "end of input",
];

/// Parses a token stream into a [`ast::Program`].
///
/// All parser state is carried by this value: the token slice, the cursor,
/// the group nesting depth, and the identifier interner. Nothing is global,
/// so independent parses can run concurrently.
pub(super) struct Parser<'src, 'tokens> {
    tokens: &'tokens [Node<Token<'src>>],
    position: usize,
    /// The number of currently open `(`, `min([` and `max([` groups.
    depth: usize,
    /// The span just past the last byte of the source, used for errors that
    /// point at end of input.
    eoi: Span,

    /// The identifiers encountered so far.
    identifiers: BTreeSet<Rc<str>>,
}

impl<'src, 'tokens> Parser<'src, 'tokens> {
    pub(super) fn new(tokens: &'tokens [Node<Token<'src>>], source_len: usize) -> Self {
        Parser {
            tokens,
            position: 0,
            depth: 0,
            eoi: Span {
                start: source_len,
                end: source_len,
            },
            identifiers: BTreeSet::new(),
        }
    }

    /// Parses a whole program:
    /// ```ignored
    /// <find block>+ "such that" <constraint> (",")? <end of input>
    /// ```
    ///
    /// This is the top-level state machine: loop on `find`, transition on
    /// `such that`, accept only at end of input. Any deviation is a
    /// [`ParseError::SyntaxError`].
    pub(super) fn parse_program(mut self) -> Result<ast::Program, ParseError> {
        let mut find_statements = Vec::new();

        loop {
            match self.peek() {
                Some(Token::Find) => self.parse_find_block(&mut find_statements)?,

                Some(Token::SuchThat) if !find_statements.is_empty() => break,

                Some(token) => {
                    return Err(ParseError::SyntaxError {
                        message: format!(
                            "expected {} but found {token}",
                            expected_statement(&find_statements)
                        ),
                        span: self.current_span(),
                    });
                }

                None => {
                    return Err(ParseError::SyntaxError {
                        message: format!(
                            "unexpected end of input; expected {}",
                            expected_statement(&find_statements)
                        ),
                        span: self.eoi,
                    });
                }
            }
        }

        let _ = self.next(); // `such that`

        let constraint = self.parse_constraint()?;

        if self.peek() == Some(Token::Comma) {
            let _ = self.next();
        }

        match self.peek() {
            None => Ok(ast::Program {
                find_statements,
                constraint,
            }),

            // An unrecognized character is reported against the grammar
            // position it occurs at, with the tokens that could have
            // continued the expression.
            Some(Token::Unknown(_)) => Err(self.unexpected(EXPRESSION_CONTINUATIONS)),

            Some(token) => Err(ParseError::SyntaxError {
                message: format!("trailing input after the constraint: found {token}"),
                span: self.current_span(),
            }),
        }
    }

    /// Parses one `find` block:
    /// ```ignored
    /// "find" <declaration> ("," <declaration>)* (",")?
    /// declaration := <identifier> ("," <identifier>)* ":" <domain>
    /// ```
    ///
    /// Every declaration becomes its own [`ast::FindStatement`].
    fn parse_find_block(
        &mut self,
        find_statements: &mut Vec<Node<ast::FindStatement>>,
    ) -> Result<(), ParseError> {
        let _ = self.next(); // `find`

        loop {
            find_statements.push(self.parse_find_statement()?);

            if self.peek() != Some(Token::Comma) {
                break;
            }
            let _ = self.next();

            // A comma either continues the block with another declaration or
            // trails before `find`, `such that` or end of input.
            if !matches!(self.peek(), Some(Token::Ident(_))) {
                break;
            }
        }

        Ok(())
    }

    fn parse_find_statement(&mut self) -> Result<Node<ast::FindStatement>, ParseError> {
        let start = self.current_span();

        let variables = self.parse_identifier_list()?;

        // The identifier list stops at the first token that is not a comma,
        // so both a comma and the colon were acceptable here.
        match self.peek() {
            Some(Token::Colon) => {
                let _ = self.next();
            }
            _ => return Err(self.unexpected(&["','", "':'"])),
        }

        let domain = self.parse_domain()?;

        Ok(Node {
            span: Span {
                start: start.start,
                end: domain.span.end,
            },
            node: ast::FindStatement { variables, domain },
        })
    }

    /// Parses a non-empty comma-separated identifier list, stopping at the
    /// first token after an identifier that is not a comma.
    fn parse_identifier_list(&mut self) -> Result<Vec<Node<Rc<str>>>, ParseError> {
        let mut variables = vec![self.parse_identifier()?];

        while self.peek() == Some(Token::Comma) {
            let _ = self.next();
            variables.push(self.parse_identifier()?);
        }

        Ok(variables)
    }

    fn parse_identifier(&mut self) -> Result<Node<Rc<str>>, ParseError> {
        match self.peek() {
            Some(Token::Ident(identifier)) => {
                let span = self.current_span();
                let _ = self.next();

                Ok(Node {
                    span,
                    node: self.intern(identifier),
                })
            }

            _ => Err(self.unexpected(&["identifier"])),
        }
    }

    /// Parses a domain:
    /// ```ignored
    /// "bool" | "int" ("(" <range> ("," <range>)* ")")?
    /// ```
    fn parse_domain(&mut self) -> Result<Node<ast::Domain>, ParseError> {
        let start = self.current_span();

        match self.peek() {
            Some(Token::Bool) => {
                let _ = self.next();

                Ok(Node {
                    span: start,
                    node: ast::Domain::Bool,
                })
            }

            Some(Token::Int) => {
                let _ = self.next();

                if self.peek() != Some(Token::OpenParen) {
                    return Ok(Node {
                        span: start,
                        node: ast::Domain::UnboundedInt,
                    });
                }

                let opener = self.current_span();
                let _ = self.next();

                let mut ranges = vec![self.parse_range()?];
                while self.peek() == Some(Token::Comma) {
                    let _ = self.next();
                    ranges.push(self.parse_range()?);
                }

                match self.peek() {
                    Some(Token::CloseParen) => {
                        let close = self.current_span();
                        let _ = self.next();

                        Ok(Node {
                            span: Span {
                                start: start.start,
                                end: close.end,
                            },
                            node: ast::Domain::Int(ranges),
                        })
                    }

                    Some(_) => Err(self.unexpected(&["','", "')'"])),

                    None => Err(ParseError::UnclosedGroup {
                        opener: "(".to_owned(),
                        span: opener,
                    }),
                }
            }

            _ => Err(self.unexpected(&["'int'", "'bool'"])),
        }
    }

    /// Parses one range list entry:
    /// ```ignored
    /// <integer> ".." <integer> | <integer> ".." | ".." <integer> | <integer>
    /// ```
    ///
    /// A bare `..` with no bound on either side is rejected. A single
    /// integer `n` denotes the range `n..n`.
    fn parse_range(&mut self) -> Result<Node<ast::Range>, ParseError> {
        let start = self.current_span();

        match self.peek() {
            Some(Token::Integer(literal)) => {
                let lower = self.integer_value(literal)?;
                let _ = self.next();

                if self.peek() != Some(Token::DoublePeriod) {
                    return Ok(Node {
                        span: start,
                        node: ast::Range::Closed {
                            lower,
                            upper: lower,
                        },
                    });
                }

                let mut end = self.current_span();
                let _ = self.next();

                if let Some(Token::Integer(literal)) = self.peek() {
                    let upper = self.integer_value(literal)?;
                    end = self.current_span();
                    let _ = self.next();

                    Ok(Node {
                        span: Span {
                            start: start.start,
                            end: end.end,
                        },
                        node: ast::Range::Closed { lower, upper },
                    })
                } else {
                    Ok(Node {
                        span: Span {
                            start: start.start,
                            end: end.end,
                        },
                        node: ast::Range::LowerBound { lower },
                    })
                }
            }

            Some(Token::DoublePeriod) => {
                let _ = self.next();

                match self.peek() {
                    Some(Token::Integer(literal)) => {
                        let upper = self.integer_value(literal)?;
                        let end = self.current_span();
                        let _ = self.next();

                        Ok(Node {
                            span: Span {
                                start: start.start,
                                end: end.end,
                            },
                            node: ast::Range::UpperBound { upper },
                        })
                    }

                    _ => Err(self.unexpected(&["integer literal"])),
                }
            }

            _ => Err(self.unexpected(&["integer literal", "'..'"])),
        }
    }

    /// Parses the constraint:
    /// ```ignored
    /// ("!")? <expression>
    /// ```
    fn parse_constraint(&mut self) -> Result<Node<ast::Constraint>, ParseError> {
        let start = self.current_span();

        let negated = if self.peek() == Some(Token::Bang) {
            let _ = self.next();
            true
        } else {
            false
        };

        let expression = self.parse_expression()?;

        Ok(Node {
            span: Span {
                start: start.start,
                end: expression.span.end,
            },
            node: ast::Constraint {
                negated,
                expression,
            },
        })
    }

    /// Parses `<conjunction> ("or" <conjunction>)*`. The whole chain is kept
    /// as one ordered sequence.
    fn parse_expression(&mut self) -> Result<Node<ast::Expression>, ParseError> {
        let first = self.parse_conjunction()?;
        let mut span = first.span;
        let mut disjuncts = vec![first];

        while self.peek() == Some(Token::Or) {
            let _ = self.next();

            let disjunct = self.parse_conjunction()?;
            span.end = disjunct.span.end;
            disjuncts.push(disjunct);
        }

        Ok(Node {
            span,
            node: ast::Expression { disjuncts },
        })
    }

    /// Parses `<comparison> ("and" <comparison>)*`.
    fn parse_conjunction(&mut self) -> Result<Node<ast::Conjunction>, ParseError> {
        let first = self.parse_comparison()?;
        let mut span = first.span;
        let mut conjuncts = vec![first];

        while self.peek() == Some(Token::And) {
            let _ = self.next();

            let conjunct = self.parse_comparison()?;
            span.end = conjunct.span.end;
            conjuncts.push(conjunct);
        }

        Ok(Node {
            span,
            node: ast::Conjunction { conjuncts },
        })
    }

    /// Parses `<addition> (<comparison op> <addition>)*`.
    ///
    /// Chains of two or more operators are legal syntax; no chain semantics
    /// are assigned here.
    fn parse_comparison(&mut self) -> Result<Node<ast::Comparison>, ParseError> {
        let first = self.parse_addition()?;
        let mut span = first.span;
        let mut rest = Vec::new();

        while let Some(op) = self.peek().and_then(comparison_operator) {
            let _ = self.next();

            let operand = self.parse_addition()?;
            span.end = operand.span.end;
            rest.push((op, operand));
        }

        Ok(Node {
            span,
            node: ast::Comparison { first, rest },
        })
    }

    /// Parses `<term> (("+" | "-") <term>)*`.
    fn parse_addition(&mut self) -> Result<Node<ast::Addition>, ParseError> {
        let first = self.parse_term()?;
        let mut span = first.span;
        let mut rest = Vec::new();

        while let Some(op) = self.peek().and_then(addition_operator) {
            let _ = self.next();

            let operand = self.parse_term()?;
            span.end = operand.span.end;
            rest.push((op, operand));
        }

        Ok(Node {
            span,
            node: ast::Addition { first, rest },
        })
    }

    /// Parses `<factor> (("*" | "/") <factor>)*`.
    fn parse_term(&mut self) -> Result<Node<ast::Term>, ParseError> {
        let first = self.parse_factor()?;
        let mut span = first.span;
        let mut rest = Vec::new();

        while let Some(op) = self.peek().and_then(multiplication_operator) {
            let _ = self.next();

            let operand = self.parse_factor()?;
            span.end = operand.span.end;
            rest.push((op, operand));
        }

        Ok(Node {
            span,
            node: ast::Term { first, rest },
        })
    }

    /// Parses a factor:
    /// ```ignored
    /// <identifier> | <integer> | "true" | "false"
    ///   | "min([" <variable list> "])" | "max([" <variable list> "])"
    ///   | "(" <expression> ")"
    /// ```
    fn parse_factor(&mut self) -> Result<Node<ast::Factor>, ParseError> {
        let start = self.current_span();

        match self.peek() {
            Some(Token::Ident(identifier)) => {
                let _ = self.next();

                Ok(Node {
                    span: start,
                    node: ast::Factor::Variable(self.intern(identifier)),
                })
            }

            Some(Token::Integer(literal)) => {
                let value = self.integer_value(literal)?;
                let _ = self.next();

                Ok(Node {
                    span: start,
                    node: ast::Factor::Constant(value),
                })
            }

            Some(Token::True) => {
                let _ = self.next();

                Ok(Node {
                    span: start,
                    node: ast::Factor::Bool(true),
                })
            }

            Some(Token::False) => {
                let _ = self.next();

                Ok(Node {
                    span: start,
                    node: ast::Factor::Bool(false),
                })
            }

            Some(opener @ (Token::MinOpen | Token::MaxOpen)) => {
                let _ = self.next();
                self.enter_group(start)?;

                let variables = self.parse_aggregate_variables()?;

                match self.peek() {
                    Some(Token::CloseAggregate) => {
                        let close = self.current_span();
                        let _ = self.next();
                        self.depth -= 1;

                        let factor = if opener == Token::MinOpen {
                            ast::Factor::Min(variables)
                        } else {
                            ast::Factor::Max(variables)
                        };

                        Ok(Node {
                            span: Span {
                                start: start.start,
                                end: close.end,
                            },
                            node: factor,
                        })
                    }

                    Some(_) => Err(self.unexpected(&["','", "'])'"])),

                    None => Err(ParseError::UnclosedGroup {
                        opener: if opener == Token::MinOpen {
                            "min([".to_owned()
                        } else {
                            "max([".to_owned()
                        },
                        span: start,
                    }),
                }
            }

            Some(Token::OpenParen) => {
                let _ = self.next();
                self.enter_group(start)?;

                let expression = self.parse_expression()?;

                match self.peek() {
                    Some(Token::CloseParen) => {
                        let close = self.current_span();
                        let _ = self.next();
                        self.depth -= 1;

                        Ok(Node {
                            span: Span {
                                start: start.start,
                                end: close.end,
                            },
                            node: ast::Factor::Parenthesized(expression.node),
                        })
                    }

                    Some(_) => Err(self.unexpected(&[
                        "'or'", "'and'", "'='", "'!='", "'<='", "'>='", "'<'", "'>'", "'+'",
                        "'-'", "'*'", "'/'", "')'",
                    ])),

                    None => Err(ParseError::UnclosedGroup {
                        opener: "(".to_owned(),
                        span: start,
                    }),
                }
            }

            _ => Err(self.unexpected(FACTOR_STARTS)),
        }
    }

    /// Parses the non-empty variable list of an aggregate. A trailing comma
    /// before `])` is permitted.
    fn parse_aggregate_variables(&mut self) -> Result<Vec<Node<Rc<str>>>, ParseError> {
        let mut variables = vec![self.parse_identifier()?];

        while self.peek() == Some(Token::Comma) {
            let _ = self.next();

            match self.peek() {
                Some(Token::Ident(_)) => variables.push(self.parse_identifier()?),
                Some(Token::CloseAggregate) | None => break,
                _ => return Err(self.unexpected(&["identifier", "'])'"])),
            }
        }

        Ok(variables)
    }

    /// Converts an integer literal token (still at the cursor) to its value,
    /// reporting digit sequences that do not fit the AST's numeric range.
    fn integer_value(&self, literal: &str) -> Result<i64, ParseError> {
        literal.parse().map_err(|_| ParseError::IntegerOverflow {
            literal: literal.to_owned(),
            span: self.current_span(),
        })
    }

    /// Registers an opened group, failing once the input nests deeper than
    /// [`MAX_EXPRESSION_DEPTH`].
    fn enter_group(&mut self, opener: Span) -> Result<(), ParseError> {
        self.depth += 1;

        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(ParseError::NestingTooDeep {
                max_depth: MAX_EXPRESSION_DEPTH,
                span: opener,
            });
        }

        Ok(())
    }

    /// Look at the current token without consuming it.
    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.position).map(|node| node.node)
    }

    /// The span of the current token, or the end-of-input span.
    fn current_span(&self) -> Span {
        self.tokens
            .get(self.position)
            .map(|node| node.span)
            .unwrap_or(self.eoi)
    }

    /// Consume the current token.
    fn next(&mut self) -> Option<Token<'src>> {
        let token = self.peek();

        if token.is_some() {
            self.position += 1;
        }

        token
    }

    /// The error for a position where none of `expected` matched: an
    /// [`ParseError::UnexpectedToken`] at the current token, or an
    /// [`ParseError::SyntaxError`] at end of input.
    fn unexpected(&self, expected: &[&str]) -> ParseError {
        let expected = expected_set(expected);

        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                found: token.to_string(),
                expected,
                span: self.current_span(),
            },

            None => ParseError::SyntaxError {
                message: format!(
                    "unexpected end of input; expected one of: {}",
                    expected.join(", ")
                ),
                span: self.eoi,
            },
        }
    }

    fn intern(&mut self, string: &str) -> Rc<str> {
        match self.identifiers.get(string) {
            Some(interned) => Rc::clone(interned),
            None => {
                let interned: Rc<str> = Rc::from(string);
                let _ = self.identifiers.insert(Rc::clone(&interned));
                interned
            }
        }
    }
}

fn comparison_operator(token: Token<'_>) -> Option<ast::CompOp> {
    match token {
        Token::Equal => Some(ast::CompOp::Equal),
        Token::NotEqual => Some(ast::CompOp::NotEqual),
        Token::LessEqual => Some(ast::CompOp::LessEqual),
        Token::GreaterEqual => Some(ast::CompOp::GreaterEqual),
        Token::Less => Some(ast::CompOp::Less),
        Token::Greater => Some(ast::CompOp::Greater),
        _ => None,
    }
}

fn addition_operator(token: Token<'_>) -> Option<ast::AddOp> {
    match token {
        Token::Plus => Some(ast::AddOp::Add),
        Token::Minus => Some(ast::AddOp::Sub),
        _ => None,
    }
}

fn multiplication_operator(token: Token<'_>) -> Option<ast::MulOp> {
    match token {
        Token::Star => Some(ast::MulOp::Mul),
        Token::Slash => Some(ast::MulOp::Div),
        _ => None,
    }
}

/// Renders an expected-token list: sorted and deduplicated so errors are
/// deterministic across parses.
fn expected_set(expected: &[&str]) -> Vec<String> {
    let mut set: Vec<String> = expected.iter().map(|entry| (*entry).to_owned()).collect();
    set.sort_unstable();
    set.dedup();
    set
}

fn expected_statement(find_statements: &[Node<ast::FindStatement>]) -> &'static str {
    if find_statements.is_empty() {
        "'find'"
    } else {
        "'find' or 'such that'"
    }
}
