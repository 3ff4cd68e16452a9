//! Parse failures for condition text.

use std::fmt;

/// Why a condition failed to compile.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("condition is empty")]
    Empty,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unexpected end of condition")]
    UnexpectedEnd,

    #[error("unbalanced parentheses")]
    UnbalancedGrouping,

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("condition nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("{function} expects {expected}")]
    InvalidArguments {
        function: &'static str,
        expected: &'static str,
    },
}

/// A parse failure with the byte offset it was detected at, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: Option<usize>,
}

impl ParseError {
    pub(crate) fn at(kind: ParseErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset: Some(offset),
        }
    }

    pub(crate) fn unlocated(kind: ParseErrorKind) -> Self {
        Self { kind, offset: None }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} at offset {}", self.kind, offset),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ParseError {}
