//! Errors produced while decoding or encoding device strings.

use thiserror::Error;

/// The kind of an [`Error`], for callers which only need to match on the category.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    InvalidQuoting,
    UnknownField,
    DuplicateField,
    InvalidBooleanFlag,
    InvalidSizeLiteral,
    InvalidNumber,
    EmptyIdentifier,
    ConflictingFields,
    InvalidValue,
}

/// Errors for parsing a device string.
///
/// Every variant keeps the offending token (or the whole input, where no single token is to
/// blame) for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not a valid JSON string literal: {input} - {reason}")]
    InvalidQuoting { input: String, reason: String },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("invalid boolean value in '{0}'")]
    InvalidBooleanFlag(String),
    #[error("invalid size literal '{0}'")]
    InvalidSizeLiteral(String),
    #[error("invalid number in '{0}'")]
    InvalidNumber(String),
    #[error("missing or empty identifier in '{0}'")]
    EmptyIdentifier(String),
    #[error("conflicting fields in '{input}': {reason}")]
    ConflictingFields { input: String, reason: &'static str },
    #[error("value cannot be printed in a device string: '{0}'")]
    InvalidValue(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidQuoting { .. } => ErrorKind::InvalidQuoting,
            Error::UnknownField(_) => ErrorKind::UnknownField,
            Error::DuplicateField(_) => ErrorKind::DuplicateField,
            Error::InvalidBooleanFlag(_) => ErrorKind::InvalidBooleanFlag,
            Error::InvalidSizeLiteral(_) => ErrorKind::InvalidSizeLiteral,
            Error::InvalidNumber(_) => ErrorKind::InvalidNumber,
            Error::EmptyIdentifier(_) => ErrorKind::EmptyIdentifier,
            Error::ConflictingFields { .. } => ErrorKind::ConflictingFields,
            Error::InvalidValue(_) => ErrorKind::InvalidValue,
        }
    }

    /// The token or input which caused this error.
    pub fn token(&self) -> &str {
        match self {
            Error::InvalidQuoting { input, .. } | Error::ConflictingFields { input, .. } => input,
            Error::UnknownField(token)
            | Error::DuplicateField(token)
            | Error::InvalidBooleanFlag(token)
            | Error::InvalidSizeLiteral(token)
            | Error::InvalidNumber(token)
            | Error::EmptyIdentifier(token)
            | Error::InvalidValue(token) => token,
        }
    }
}
