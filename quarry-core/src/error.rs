use crate::Error;
use std::fmt::{self, Display};

/// Coarse classification carried by every error this crate produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed arguments, detected before any dispatch.
    Validation,
    /// An attribute key that is not recognized.
    UnknownAttribute,
    /// Any failure reported by the dispatch channel.
    Database,
    /// The dispatch channel rejected a write because of a unique constraint.
    UniqueViolation,
    /// A create lost a uniqueness race and the following lookup found nothing.
    MissingAfterConflict,
    /// A row that was expected to exist is no longer in storage.
    RowVanished,
    /// Persistence operation on a row that is not in storage.
    NotInStorage,
    NoSuchRelationship,
    UnresolvedReverseRelationship,
    /// Neither a column nor a relationship has the requested name.
    NoSuchAccessor,
    NoSuchSource,
}

impl ErrorKind {
    /// Short tag, stable across versions, suitable for matching in callers.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::Validation | ErrorKind::UnknownAttribute => "validation_error",
            ErrorKind::Database => "db_error",
            ErrorKind::UniqueViolation => "unique_violation",
            ErrorKind::MissingAfterConflict => "logic_error",
            ErrorKind::RowVanished => "row_vanished",
            ErrorKind::NotInStorage => "not_in_storage",
            ErrorKind::NoSuchRelationship | ErrorKind::UnresolvedReverseRelationship => {
                "relationship_error"
            }
            ErrorKind::NoSuchAccessor => "no_such_accessor",
            ErrorKind::NoSuchSource => "no_such_source",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::UnknownAttribute)
    }

    pub fn is_dispatch(&self) -> bool {
        matches!(self, ErrorKind::Database | ErrorKind::UniqueViolation)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classified error, always travels inside an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl QuarryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for QuarryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.tag(), self.message)
    }
}

impl std::error::Error for QuarryError {}

/// Build an [`Error`] of the given kind.
pub fn error(kind: ErrorKind, message: impl Into<String>) -> Error {
    Error::new(QuarryError::new(kind, message))
}

/// Classification of the first [`QuarryError`] found in the chain, if any.
pub fn error_kind(error: &Error) -> Option<ErrorKind> {
    error
        .downcast_ref::<QuarryError>()
        .or_else(|| error.chain().find_map(|e| e.downcast_ref::<QuarryError>()))
        .map(|e| e.kind)
}

pub fn is_unique_violation(error: &Error) -> bool {
    error_kind(error) == Some(ErrorKind::UniqueViolation)
}

/// Classify an error message coming from a channel that does not tag its errors.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("unique") || lower.contains("duplicate") {
        ErrorKind::UniqueViolation
    } else {
        ErrorKind::Database
    }
}
