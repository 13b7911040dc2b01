//! Via entries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// RFC 3261 magic cookie prefixing every branch identifier.
pub const MAGIC_COOKIE: &str = "z9hG4bK";

/// One Via header entry.
///
/// Responses carry the request's Via stack back unchanged, so the branch
/// parameter of the topmost entry is what correlates a response to the
/// transaction (and therefore to the proxy branch) that sent the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Via {
    /// Transport token as written on the wire (UDP, TCP, TLS, ...).
    pub transport: String,
    /// `host[:port]` of the element that inserted this entry.
    pub sent_by: String,
    /// The branch parameter, unique per transaction.
    pub branch: Option<String>,
    /// Remaining parameters (received, rport, ...).
    pub params: Vec<(String, Option<String>)>,
}

impl Via {
    pub fn new(transport: impl Into<String>, sent_by: impl Into<String>) -> Self {
        Via {
            transport: transport.into(),
            sent_by: sent_by.into(),
            branch: None,
            params: Vec::new(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SIP/2.0/{} {}",
            self.transport.to_ascii_uppercase(),
            self.sent_by
        )?;
        if let Some(branch) = &self.branch {
            write!(f, ";branch={}", branch)?;
        }
        for (name, value) in &self.params {
            match value {
                Some(v) => write!(f, ";{}={}", name, v)?,
                None => write!(f, ";{}", name)?,
            }
        }
        Ok(())
    }
}
