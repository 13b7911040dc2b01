//! SIP status codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A SIP response status code.
///
/// Stored as the bare numeric value; the engine cares about classes
/// (1xx through 6xx) and a handful of named codes, not the full RFC
/// catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const TRYING: StatusCode = StatusCode(100);
    pub const RINGING: StatusCode = StatusCode(180);
    pub const OK: StatusCode = StatusCode(200);
    pub const MOVED_TEMPORARILY: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const BUSY_HERE: StatusCode = StatusCode(486);
    pub const REQUEST_TERMINATED: StatusCode = StatusCode(487);
    pub const SERVER_INTERNAL_ERROR: StatusCode = StatusCode(500);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);
    pub const BUSY_EVERYWHERE: StatusCode = StatusCode(600);
    pub const DECLINE: StatusCode = StatusCode(603);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// The response class, 1 through 6.
    pub fn class(&self) -> u16 {
        self.0 / 100
    }

    pub fn is_provisional(&self) -> bool {
        self.class() == 1
    }

    pub fn is_final(&self) -> bool {
        self.0 >= 200
    }

    pub fn is_success(&self) -> bool {
        self.class() == 2
    }

    pub fn is_redirect(&self) -> bool {
        self.class() == 3
    }

    /// Default reason phrase for the codes the engine synthesizes itself.
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Trying",
            180 => "Ringing",
            200 => "OK",
            302 => "Moved Temporarily",
            400 => "Bad Request",
            404 => "Not Found",
            408 => "Request Timeout",
            486 => "Busy Here",
            487 => "Request Terminated",
            500 => "Server Internal Error",
            503 => "Service Unavailable",
            600 => "Busy Everywhere",
            603 => "Decline",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert!(StatusCode::TRYING.is_provisional());
        assert!(!StatusCode::TRYING.is_final());
        assert!(StatusCode::OK.is_success());
        assert!(StatusCode::OK.is_final());
        assert!(StatusCode::MOVED_TEMPORARILY.is_redirect());
        assert_eq!(StatusCode::BUSY_EVERYWHERE.class(), 6);
        assert_eq!(StatusCode(183).class(), 1);
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(StatusCode::REQUEST_TIMEOUT.reason_phrase(), "Request Timeout");
        assert_eq!(StatusCode::TRYING.reason_phrase(), "Trying");
        assert_eq!(StatusCode(499).reason_phrase(), "Unknown");
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(StatusCode::OK < StatusCode::NOT_FOUND);
        assert!(StatusCode(180) < StatusCode(183));
    }
}
