use crate::evaluator::EvalError;
use crate::parser::ParseError;
use crate::source::Span;
use std::fmt;
use thiserror::Error;

/// Any failure from running source text through the whole pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Coarse classification of a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Evaluation,
    StackExhausted,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(ParseError::NestingTooDeep { .. }) => ErrorKind::StackExhausted,
            Error::Parse(_) => ErrorKind::Syntax,
            Error::Eval(EvalError::EnvError(_)) => ErrorKind::Name,
            Error::Eval(EvalError::StackExhausted { .. }) => ErrorKind::StackExhausted,
            Error::Eval(_) => ErrorKind::Evaluation,
        }
    }

    /// Where in the source the failure was detected; `None` when input ran out.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse(ParseError::UnexpectedToken { found, .. }) => Some(found.span),
            Error::Parse(ParseError::UnexpectedEof(_)) => None,
            Error::Parse(ParseError::NestingTooDeep { span, .. }) => Some(*span),
            Error::Eval(err) => Some(err.span()),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "SyntaxError"),
            ErrorKind::Name => write!(f, "NameError"),
            ErrorKind::Evaluation => write!(f, "EvaluationError"),
            ErrorKind::StackExhausted => write!(f, "StackExhausted"),
        }
    }
}
