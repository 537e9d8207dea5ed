use std::fmt::Display;

use chumsky::error::Rich;
use chumsky::extra::{self};
use chumsky::prelude::any;
use chumsky::prelude::choice;
use chumsky::prelude::just;
use chumsky::prelude::one_of;
use chumsky::text::ascii::ident;
use chumsky::text::digits;
use chumsky::IterParser;
use chumsky::Parser;

use crate::ast;

/// The tokens of the modelling language.
///
/// `min([` and `max([` are single composite tokens, as is their closing
/// `])`; `such that` is one keyword token spanning both words. A character
/// that cannot start any token becomes [`Token::Unknown`] so the parser can
/// report it against the grammar position where it occurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'src> {
    // Keywords
    Find,
    SuchThat,
    Int,
    Bool,
    Or,
    And,
    True,
    False,
    // Punctuation
    Colon,
    Comma,
    OpenParen,
    CloseParen,
    DoublePeriod,
    Bang,
    // Aggregate brackets
    MinOpen,
    MaxOpen,
    CloseAggregate,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    // Values
    Ident(&'src str),
    /// An integer literal, kept as its digit slice. The parser converts it
    /// on consumption so that out-of-range literals are reported in source
    /// order like every other error.
    Integer(&'src str),
    Unknown(char),
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Find => write!(f, "'find'"),
            Token::SuchThat => write!(f, "'such that'"),
            Token::Int => write!(f, "'int'"),
            Token::Bool => write!(f, "'bool'"),
            Token::Or => write!(f, "'or'"),
            Token::And => write!(f, "'and'"),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Colon => write!(f, "':'"),
            Token::Comma => write!(f, "','"),
            Token::OpenParen => write!(f, "'('"),
            Token::CloseParen => write!(f, "')'"),
            Token::DoublePeriod => write!(f, "'..'"),
            Token::Bang => write!(f, "'!'"),
            Token::MinOpen => write!(f, "'min(['"),
            Token::MaxOpen => write!(f, "'max(['"),
            Token::CloseAggregate => write!(f, "'])'"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Equal => write!(f, "'='"),
            Token::NotEqual => write!(f, "'!='"),
            Token::LessEqual => write!(f, "'<='"),
            Token::GreaterEqual => write!(f, "'>='"),
            Token::Less => write!(f, "'<'"),
            Token::Greater => write!(f, "'>'"),
            Token::Ident(identifier) => write!(f, "identifier '{identifier}'"),
            Token::Integer(literal) => write!(f, "integer '{literal}'"),
            Token::Unknown(character) => write!(f, "'{character}'"),
        }
    }
}

type LexExtra<'src> = extra::Err<Rich<'src, char>>;

pub(super) fn lex<'src>(
) -> impl Parser<'src, &'src str, Vec<ast::Node<Token<'src>>>, LexExtra<'src>> {
    token()
        .padded_by(comment().repeated())
        .padded()
        .repeated()
        .collect()
}

fn comment<'src>() -> impl Parser<'src, &'src str, (), LexExtra<'src>> {
    just("$")
        .then(any().and_is(just('\n').not()).repeated())
        .padded()
        .ignored()
}

fn token<'src>() -> impl Parser<'src, &'src str, ast::Node<Token<'src>>, LexExtra<'src>> {
    choice((
        // Multi-word and composite tokens, before the identifier rule can
        // swallow their leading word.
        such_that(),
        just("min([").to(Token::MinOpen),
        just("max([").to(Token::MaxOpen),
        just("])").to(Token::CloseAggregate),
        // Operators, longest first.
        just("..").to(Token::DoublePeriod),
        just("!=").to(Token::NotEqual),
        just("<=").to(Token::LessEqual),
        just(">=").to(Token::GreaterEqual),
        just("<").to(Token::Less),
        just(">").to(Token::Greater),
        just("=").to(Token::Equal),
        just("!").to(Token::Bang),
        just("+").to(Token::Plus),
        just("-").to(Token::Minus),
        just("*").to(Token::Star),
        just("/").to(Token::Slash),
        // Punctuation
        just(":").to(Token::Colon),
        just(",").to(Token::Comma),
        just("(").to(Token::OpenParen),
        just(")").to(Token::CloseParen),
        // Values, keywords and identifiers
        int_literal(),
        word(),
        // Anything else is an unknown character; the parser rejects it with
        // the expected-set of the position where it shows up.
        any().map(Token::Unknown),
    ))
    .map_with(|token, extra| {
        let span: chumsky::prelude::SimpleSpan = extra.span();

        ast::Node {
            node: token,
            span: span.into(),
        }
    })
}

/// The two-word `such that` keyword: `such`, at least one whitespace
/// character, then `that` ending at a word boundary. If any part is missing
/// the lexer falls back to the identifier rule.
fn such_that<'src>() -> impl Parser<'src, &'src str, Token<'src>, LexExtra<'src>> {
    just("such")
        .then(one_of(" \t\r\n").repeated().at_least(1))
        .then(just("that"))
        .then_ignore(ident_char().not())
        .to(Token::SuchThat)
}

fn ident_char<'src>() -> impl Parser<'src, &'src str, char, LexExtra<'src>> {
    any().filter(|character: &char| character.is_ascii_alphanumeric() || *character == '_')
}

fn word<'src>() -> impl Parser<'src, &'src str, Token<'src>, LexExtra<'src>> {
    ident().map(|word: &str| match word {
        "find" => Token::Find,
        "int" => Token::Int,
        "bool" => Token::Bool,
        "or" => Token::Or,
        "and" => Token::And,
        "true" => Token::True,
        "false" => Token::False,
        identifier => Token::Ident(identifier),
    })
}

fn int_literal<'src>() -> impl Parser<'src, &'src str, Token<'src>, LexExtra<'src>> {
    digits(10).to_slice().map(Token::Integer)
}
