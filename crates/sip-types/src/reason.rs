//! RFC 3326 Reason values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One Reason header value, attached to CANCEL requests to tell the far end
/// why a branch is being torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonInfo {
    /// Protocol token, usually `SIP` or `Q.850`.
    pub protocol: String,
    pub cause: u16,
    pub text: String,
}

impl ReasonInfo {
    pub fn new(protocol: impl Into<String>, cause: u16, text: impl Into<String>) -> Self {
        ReasonInfo {
            protocol: protocol.into(),
            cause,
            text: text.into(),
        }
    }

    /// The conventional "call completed elsewhere" reason sent when a
    /// winning branch cancels its siblings.
    pub fn call_completed_elsewhere() -> Self {
        ReasonInfo::new("SIP", 200, "Call completed elsewhere")
    }
}

impl fmt::Display for ReasonInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};cause={};text=\"{}\"",
            self.protocol, self.cause, self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let reason = ReasonInfo::new("SIP", 487, "Timeout");
        assert_eq!(reason.to_string(), "SIP;cause=487;text=\"Timeout\"");
    }
}
