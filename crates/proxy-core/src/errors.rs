//! Error types for the proxy engine.
//!
//! The taxonomy mirrors how callers are expected to react:
//!
//! - **InvalidState**: the operation is outside its legal state-machine
//!   transition (double start, cancel after ACK, policy change after start).
//!   Surfaced immediately, never retried; the proxy operation is otherwise
//!   untouched.
//! - **InvalidArgument**: malformed input such as an unsupported target
//!   scheme. Batch target validation fails atomically before any branch is
//!   created.
//! - **Transport**: a send failed. Reported to the caller, never retried
//!   automatically; for final responses the bookkeeping is still cleared so
//!   a later retransmission cannot double-send.
//! - **Key**: session-key or routing-tag processing failed; wraps the
//!   session-core error with its diagnostics intact.
//!
//! A branch timeout is not an error. It is a first-class branch outcome
//! that participates in aggregation like any other terminal state.

use thiserror::Error;

use sipfork_session_core::SessionKeyError;

use crate::transport::TransportError;

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors surfaced by [`ProxyCore`](crate::proxy::ProxyCore) and its
/// branches.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("transport failure: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("session key failure: {source}")]
    Key {
        #[from]
        source: SessionKeyError,
    },
}

impl ProxyError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        ProxyError::InvalidState {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ProxyError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, ProxyError::InvalidState { .. })
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ProxyError::InvalidArgument { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ProxyError::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_and_predicates() {
        let err = ProxyError::invalid_state("already started");
        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "invalid state: already started");

        let err = ProxyError::invalid_argument("unsupported scheme");
        assert!(err.is_invalid_argument());
        assert!(!err.is_invalid_state());
        assert_eq!(err.to_string(), "invalid argument: unsupported scheme");
    }

    #[test]
    fn test_conversions() {
        let transport = TransportError::send_failed("socket closed");
        let err: ProxyError = transport.into();
        assert!(err.is_transport());

        let key = SessionKeyError::missing_delimiter("(", "x", 0);
        let err: ProxyError = key.into();
        assert!(matches!(err, ProxyError::Key { .. }));
    }
}
