//! Transaction keys.
//!
//! The engine never owns transaction state; the hosting transaction layer
//! does. What it needs is a value that names a transaction so a later
//! response (or a CANCEL, or the upstream final response) can be correlated
//! with the branch that opened it. Per RFC 3261 that value is the branch
//! parameter of the topmost Via plus the method, qualified by which side of
//! the transaction we sit on.

use std::fmt;

use sipfork_sip_types::{Method, Request, Response};

/// Names one transaction at the hosting transaction layer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    branch: String,
    method: Method,
    is_server: bool,
}

impl TransactionKey {
    pub fn new(branch: impl Into<String>, method: Method, is_server: bool) -> Self {
        TransactionKey {
            branch: branch.into(),
            method,
            is_server,
        }
    }

    /// Key of the transaction a request belongs to, taken from its top Via.
    /// `is_server` is true for requests we received, false for requests we
    /// sent. Returns `None` when the request carries no branch parameter.
    pub fn for_request(request: &Request, is_server: bool) -> Option<Self> {
        request
            .via_branch()
            .map(|branch| TransactionKey::new(branch, request.method.clone(), is_server))
    }

    /// Key of the client transaction a received response answers.
    pub fn for_response(response: &Response) -> Option<Self> {
        response
            .via_branch()
            .map(|branch| TransactionKey::new(branch, response.cseq.method.clone(), false))
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }
}

impl fmt::Debug for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.branch,
            self.method,
            if self.is_server { "server" } else { "client" }
        )
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", self)
    }
}
