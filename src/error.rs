use core::fmt;

use serde::Deserialize;
use thiserror::Error;


/// User-visible error categories. Every error a well-formed program can
/// trigger falls into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ErrorKind {
    SyntaxError,
    UnboundVariable,
    WrongArgumentCount,
    WrongOperandType,
    DivisionByZero,
    IntegerOverflow,
    MalformedForm,
    NotAProcedure,
    NoMatchingClause,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SyntaxError => "syntax error",
            Self::UnboundVariable => "unbound variable",
            Self::WrongArgumentCount => "wrong number of arguments",
            Self::WrongOperandType => "wrong operand type",
            Self::DivisionByZero => "division by zero",
            Self::IntegerOverflow => "integer overflow",
            Self::MalformedForm => "malformed special form",
            Self::NotAProcedure => "attempt to apply a non-procedure",
            Self::NoMatchingClause => "no matching cond clause",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemeError {
    /// A normal outcome of running a bad program. The driver reports it and
    /// moves on to the next top-level form.
    #[error("RuntimeError: {kind}: {message}")]
    Runtime { kind: ErrorKind, message: String },

    /// Something the interpreter itself got wrong.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type SchemeResult<T> = Result<T, SchemeError>;

impl SchemeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Runtime { kind, message: message.into() }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message)
    }

    pub fn unbound(name: &str) -> Self {
        Self::new(ErrorKind::UnboundVariable, name)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongArgumentCount, message)
    }

    pub fn operand_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongOperandType, message)
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "attempted to divide by zero")
    }

    pub fn overflow() -> Self {
        Self::new(ErrorKind::IntegerOverflow, "result does not fit in a fixnum")
    }

    pub fn malformed(form: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedForm, format!("{}: {}", form, message.into()))
    }

    pub fn not_a_procedure(value: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotAProcedure, value.to_string())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The category of a runtime error, or `None` for internal failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Runtime { kind, .. } => Some(*kind),
            Self::Internal(_) => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
