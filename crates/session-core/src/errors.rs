//! Error types for key computation, parsing and tag handling.

use thiserror::Error;

/// Result type for session-key operations.
pub type SessionKeyResult<T> = Result<T, SessionKeyError>;

/// Errors raised while computing, parsing or decoding correlation keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyError {
    /// A key's textual form was missing one of its structural delimiters.
    /// Carries the delimiter that was expected, the offending input and the
    /// byte offset where the search started.
    #[error("missing '{delimiter}' in key '{input}' (offset {index})")]
    MissingDelimiter {
        delimiter: &'static str,
        input: String,
        index: usize,
    },

    /// The application name was absent where one is mandatory. This is a
    /// programming error in the caller, not a recoverable condition.
    #[error("application name is required to {operation}")]
    MissingApplicationName { operation: &'static str },

    /// A routing token carried an application hash this deployment has never
    /// issued. The token claimed to be ours, so this is an internal
    /// inconsistency rather than foreign traffic.
    #[error("no application name registered for hash '{hash}'")]
    UnknownApplicationHash { hash: String },

    /// An application unknown to the registry was asked to be encoded.
    #[error("no hash registered for application '{name}'")]
    UnknownApplicationName { name: String },
}

impl SessionKeyError {
    pub fn missing_delimiter(
        delimiter: &'static str,
        input: impl Into<String>,
        index: usize,
    ) -> Self {
        SessionKeyError::MissingDelimiter {
            delimiter,
            input: input.into(),
            index,
        }
    }

    pub fn missing_application_name(operation: &'static str) -> Self {
        SessionKeyError::MissingApplicationName { operation }
    }

    pub fn unknown_hash(hash: impl Into<String>) -> Self {
        SessionKeyError::UnknownApplicationHash { hash: hash.into() }
    }

    pub fn unknown_application(name: impl Into<String>) -> Self {
        SessionKeyError::UnknownApplicationName { name: name.into() }
    }

    /// The offending input fragment, for parse failures.
    pub fn offending_input(&self) -> Option<&str> {
        match self {
            SessionKeyError::MissingDelimiter { input, .. } => Some(input),
            SessionKeyError::UnknownApplicationHash { hash } => Some(hash),
            SessionKeyError::UnknownApplicationName { name } => Some(name),
            SessionKeyError::MissingApplicationName { .. } => None,
        }
    }
}
