//! The AST for a program in the modelling language.
//!
//! A program is a sequence of `find` statements declaring decision variables
//! over integer or boolean domains, followed by a single `such that`
//! constraint. Every node is built once during parsing and never mutated;
//! ownership is strictly tree-shaped.
//!
//! All identifiers are [`Rc`]s so that repeated references to the same
//! variable share one allocation.

use std::fmt::Display;
use std::rc::Rc;

use itertools::Itertools;

/// A whole program: one or more [`FindStatement`]s followed by a single
/// [`Constraint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    /// The variable declarations, in source order.
    pub find_statements: Vec<Node<FindStatement>>,
    /// The constraint introduced by `such that`.
    pub constraint: Node<Constraint>,
}

/// A single declaration: one or more identifiers sharing a [`Domain`].
///
/// The identifiers are syntactically distinct tokens; whether they are
/// semantically unique across the program is not checked here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindStatement {
    pub variables: Vec<Node<Rc<str>>>,
    pub domain: Node<Domain>,
}

/// The domain of the variables in a [`FindStatement`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Domain {
    /// A finite union of integer ranges, `int(..)`.
    Int(Vec<Node<Range>>),
    /// The set of all integers, a bare `int`.
    UnboundedInt,
    /// A boolean domain.
    Bool,
}

/// One interval in an integer domain.
///
/// Bounds are not validated against each other; `Closed { lower: 3, upper: 1 }`
/// parses fine and denotes an empty range to whoever consumes the AST.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Range {
    /// `lower..upper`. A single integer `n` is recorded as `n..n`.
    Closed { lower: i64, upper: i64 },
    /// `lower..`
    LowerBound { lower: i64 },
    /// `..upper`
    UpperBound { upper: i64 },
}

/// The top-level boolean formula of the program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    /// Whether the constraint is prefixed with `!`.
    pub negated: bool,
    pub expression: Node<Expression>,
}

/// One or more [`Conjunction`]s joined by `or`.
///
/// Operator chains are kept as ordered sequences rather than folded into
/// nested pairs, so consumers see the chain exactly as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression {
    pub disjuncts: Vec<Node<Conjunction>>,
}

/// One or more [`Comparison`]s joined by `and`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conjunction {
    pub conjuncts: Vec<Node<Comparison>>,
}

/// An [`Addition`], possibly followed by comparison operators and further
/// additions.
///
/// Chains of more than one operator (`a < b < c`) are legal syntax and are
/// surfaced as-is; the grammar assigns no meaning to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comparison {
    pub first: Node<Addition>,
    pub rest: Vec<(CompOp, Node<Addition>)>,
}

/// A chain of [`Term`]s joined by `+` and `-`, left-associative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Addition {
    pub first: Node<Term>,
    pub rest: Vec<(AddOp, Node<Term>)>,
}

/// A chain of [`Factor`]s joined by `*` and `/`, left-associative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub first: Node<Factor>,
    pub rest: Vec<(MulOp, Node<Factor>)>,
}

/// The leaves of the expression grammar, plus parenthesized recursion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Factor {
    /// A reference to a declared variable.
    Variable(Rc<str>),
    /// An integer literal.
    Constant(i64),
    /// A `true` or `false` literal.
    Bool(bool),
    /// `min([ .. ])` over a list of variables.
    Min(Vec<Node<Rc<str>>>),
    /// `max([ .. ])` over a list of variables.
    Max(Vec<Node<Rc<str>>>),
    /// A parenthesized sub-expression.
    Parenthesized(Expression),
}

/// A comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompOp {
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
}

/// `+` or `-`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOp {
    Add,
    Sub,
}

/// `*` or `/`.
///
/// Whether `/` means integer or real division is up to the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MulOp {
    Mul,
    Div,
}

/// Describes a range `[start, end)` of byte offsets in the source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    /// The offset in the source that starts the span.
    pub start: usize,
    /// The offset in the source that ends the span.
    ///
    /// Note the end is exclusive.
    pub end: usize,
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

impl From<chumsky::span::SimpleSpan> for Span {
    fn from(value: chumsky::span::SimpleSpan) -> Self {
        Span {
            start: value.start,
            end: value.end,
        }
    }
}

/// A node in the AST: a parsed value together with its source span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<T> {
    /// The span in the source of this node.
    pub span: Span,
    /// The parsed node.
    pub node: T,
}

impl<T: Display> Display for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.node.fmt(f)
    }
}

// The `Display` impls below render canonical surface syntax: parsing the
// rendered text again produces a structurally identical AST. Canonical form
// uses one `find` keyword per statement, `lower..upper` for every closed
// range, and no trailing commas.

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.find_statements {
            writeln!(f, "{statement}")?;
        }
        write!(f, "such that {}", self.constraint)
    }
}

impl Display for FindStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "find {} : {}",
            self.variables.iter().format(", "),
            self.domain
        )
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Int(ranges) => write!(f, "int({})", ranges.iter().format(", ")),
            Domain::UnboundedInt => write!(f, "int"),
            Domain::Bool => write!(f, "bool"),
        }
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Range::Closed { lower, upper } => write!(f, "{lower}..{upper}"),
            Range::LowerBound { lower } => write!(f, "{lower}.."),
            Range::UpperBound { upper } => write!(f, "..{upper}"),
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        write!(f, "{}", self.expression)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.disjuncts.iter().format(" or "))
    }
}

impl Display for Conjunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.conjuncts.iter().format(" and "))
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {op} {operand}")?;
        }
        Ok(())
    }
}

impl Display for Addition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {op} {operand}")?;
        }
        Ok(())
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {op} {operand}")?;
        }
        Ok(())
    }
}

impl Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Factor::Variable(identifier) => write!(f, "{identifier}"),
            Factor::Constant(value) => write!(f, "{value}"),
            Factor::Bool(value) => write!(f, "{value}"),
            Factor::Min(variables) => write!(f, "min([{}])", variables.iter().format(", ")),
            Factor::Max(variables) => write!(f, "max([{}])", variables.iter().format(", ")),
            Factor::Parenthesized(expression) => write!(f, "({expression})"),
        }
    }
}

impl Display for CompOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CompOp::Equal => "=",
            CompOp::NotEqual => "!=",
            CompOp::LessEqual => "<=",
            CompOp::GreaterEqual => ">=",
            CompOp::Less => "<",
            CompOp::Greater => ">",
        };

        write!(f, "{symbol}")
    }
}

impl Display for AddOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddOp::Add => write!(f, "+"),
            AddOp::Sub => write!(f, "-"),
        }
    }
}

impl Display for MulOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MulOp::Mul => write!(f, "*"),
            MulOp::Div => write!(f, "/"),
        }
    }
}
