use crate::ast::Span;

/// The errors that can be encountered while parsing a program.
///
/// Parsing is fail-fast: the first error aborts the parse and no partial AST
/// is returned. Every variant carries the span of the offending input.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A character that cannot start any token.
    #[error("unrecognized character '{character}' at {span}")]
    LexError { character: char, span: Span },

    /// The token stream matches no grammar alternative at this position.
    #[error("unexpected {found} at {span}; expected one of: {}", .expected.join(", "))]
    UnexpectedToken {
        found: String,
        /// The token kinds that would have been accepted, sorted and deduped.
        expected: Vec<String>,
        span: Span,
    },

    /// A `(`, `min([` or `max([` whose closing token never appears.
    #[error("unclosed '{opener}' at {span}")]
    UnclosedGroup { opener: String, span: Span },

    /// A structural failure: missing `such that`, an empty program, or
    /// trailing input after the constraint.
    #[error("{message} at {span}")]
    SyntaxError { message: String, span: Span },

    /// The expression nesting guard triggered.
    #[error("expression nesting exceeds the maximum depth of {max_depth} at {span}")]
    NestingTooDeep { max_depth: usize, span: Span },

    /// An integer literal whose digit sequence does not fit in an `i64`.
    #[error("integer literal '{literal}' is out of range at {span}")]
    IntegerOverflow { literal: String, span: Span },
}

impl ParseError {
    /// The source span the error points at.
    pub fn span(&self) -> Span {
        match self {
            ParseError::LexError { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnclosedGroup { span, .. }
            | ParseError::SyntaxError { span, .. }
            | ParseError::NestingTooDeep { span, .. }
            | ParseError::IntegerOverflow { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_token_lists_the_expected_set() {
        let error = ParseError::UnexpectedToken {
            found: "','".to_owned(),
            expected: vec!["'('".to_owned(), "identifier".to_owned()],
            span: Span { start: 4, end: 5 },
        };

        assert_eq!(
            "unexpected ',' at (4, 5); expected one of: '(', identifier",
            error.to_string()
        );
    }
}
