//! Parser error types

use thiserror::Error;
use vesper_ast::Span;
use vesper_lexer::TokenKind;

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("invalid token '{text}'")]
    InvalidToken { text: String, span: Span },

    #[error("invalid expression")]
    InvalidExpression { span: Span },

    #[error("invalid literal '{text}'")]
    InvalidLiteral { text: String, span: Span },

    #[error("expected member declaration")]
    ExpectedMember { span: Span },

    #[error("preprocessor: {message}")]
    Directive { message: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. } => *span,
            ParseError::InvalidToken { span, .. } => *span,
            ParseError::InvalidExpression { span } => *span,
            ParseError::InvalidLiteral { span, .. } => *span,
            ParseError::ExpectedMember { span } => *span,
            ParseError::Directive { span, .. } => *span,
        }
    }

    /// Error code for machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedToken { .. } => "E-PARSE-001",
            ParseError::InvalidToken { .. } => "E-PARSE-002",
            ParseError::InvalidExpression { .. } => "E-PARSE-003",
            ParseError::InvalidLiteral { .. } => "E-PARSE-004",
            ParseError::ExpectedMember { .. } => "E-PARSE-005",
            ParseError::Directive { .. } => "E-PARSE-006",
        }
    }

    pub fn unexpected(expected: impl Into<String>, found: TokenKind, span: Span) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: found.describe().to_string(),
            span,
        }
    }
}
