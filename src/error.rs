//! Error classification shared by the subscription flow and the poller.
//!
//! Every failure that reaches the user is one of three kinds. The store keeps
//! a single [`ErrorStatus`]; a new error always supersedes the previous one.

use chrono::{DateTime, Utc};
use std::fmt;

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or already-subscribed URL.
    Validation,
    /// The feed could not be retrieved.
    Transport,
    /// The feed was retrieved but is not RSS/Atom.
    Parsing,
}

impl ErrorKind {
    /// Stable message code for a presentation layer to localize.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validationError",
            ErrorKind::Transport => "networkError",
            ErrorKind::Parsing => "parsingError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Implemented by every error that can land in the error status.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// The current error shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorStatus {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorStatus {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// Builds a status from any classified error, using its `Display` text.
    pub fn from_error<E: Classify + fmt::Display>(err: &E) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        assert_eq!(ErrorKind::Validation.code(), "validationError");
        assert_eq!(ErrorKind::Transport.code(), "networkError");
        assert_eq!(ErrorKind::Parsing.code(), "parsingError");
    }

    #[test]
    fn test_status_keeps_kind_and_message() {
        let status = ErrorStatus::new(ErrorKind::Transport, "connection refused");
        assert_eq!(status.kind, ErrorKind::Transport);
        assert_eq!(status.message, "connection refused");
    }
}
