//! Request and response value objects.
//!
//! These carry exactly the header set the proxy engine reads or rewrites.
//! They are plain values: cloning one is cheap enough to treat a derived
//! branch request as an independent object, and nothing here touches wire
//! bytes.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::method::Method;
use crate::reason::ReasonInfo;
use crate::status::StatusCode;
use crate::uri::Uri;
use crate::via::Via;

/// CSeq header value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CSeq {
    pub sequence: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(sequence: u32, method: Method) -> Self {
        CSeq { sequence, method }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sequence, self.method)
    }
}

/// Access to the dialog-identifying fields shared by requests and responses.
///
/// Session-key derivation works off either message kind, so it is written
/// against this trait instead of the concrete types.
pub trait DialogHeaders {
    fn from_tag(&self) -> Option<&str>;
    fn to_tag(&self) -> Option<&str>;
    fn call_id(&self) -> &str;
}

/// A parsed SIP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    /// Request-URI: where this request is being sent.
    pub uri: Uri,
    pub from: Address,
    pub to: Address,
    pub call_id: String,
    pub cseq: CSeq,
    /// Via stack, topmost entry first.
    pub via: Vec<Via>,
    pub max_forwards: Option<u32>,
    pub contacts: Vec<Address>,
    /// Record-Route stack, topmost entry first.
    pub record_routes: Vec<Uri>,
    /// Remaining Route set, topmost entry first.
    pub routes: Vec<Uri>,
    /// Path entries (REGISTER flows), topmost entry first.
    pub paths: Vec<Uri>,
    /// Reason header values, populated on CANCEL requests.
    pub reasons: Vec<ReasonInfo>,
    /// Whether this is the dialog-initiating request. Set by the dispatch
    /// layer; only initial requests may be forked.
    pub initial: bool,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri, from: Address, to: Address, call_id: impl Into<String>) -> Self {
        let cseq = CSeq::new(1, method.clone());
        Request {
            method,
            uri,
            from,
            to,
            call_id: call_id.into(),
            cseq,
            via: Vec::new(),
            max_forwards: None,
            contacts: Vec::new(),
            record_routes: Vec::new(),
            routes: Vec::new(),
            paths: Vec::new(),
            reasons: Vec::new(),
            initial: true,
            body: Bytes::new(),
        }
    }

    pub fn with_via(mut self, via: Via) -> Self {
        self.via.insert(0, via);
        self
    }

    pub fn with_initial(mut self, initial: bool) -> Self {
        self.initial = initial;
        self
    }

    /// Topmost Via entry, if any.
    pub fn top_via(&self) -> Option<&Via> {
        self.via.first()
    }

    /// Branch parameter of the topmost Via entry.
    pub fn via_branch(&self) -> Option<&str> {
        self.top_via().and_then(|v| v.branch.as_deref())
    }
}

impl DialogHeaders for Request {
    fn from_tag(&self) -> Option<&str> {
        self.from.tag()
    }

    fn to_tag(&self) -> Option<&str> {
        self.to.tag()
    }

    fn call_id(&self) -> &str {
        &self.call_id
    }
}

/// A parsed SIP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    /// Reason phrase as received, or the default for synthesized responses.
    pub reason: String,
    pub from: Address,
    pub to: Address,
    pub call_id: String,
    pub cseq: CSeq,
    /// Via stack mirrored from the request, topmost entry first.
    pub via: Vec<Via>,
    /// Contact list; for 3xx responses these are the redirect targets.
    pub contacts: Vec<Address>,
    pub record_routes: Vec<Uri>,
    pub body: Bytes,
}

impl Response {
    /// Builds a response mirroring the dialog-identifying headers of a
    /// request, Via stack included. This is the base for every response the
    /// engine synthesizes itself (100 Trying, 408 on branch timeout).
    pub fn to_request(status: StatusCode, request: &Request) -> Self {
        Response {
            status,
            reason: status.reason_phrase().to_string(),
            from: request.from.clone(),
            to: request.to.clone(),
            call_id: request.call_id.clone(),
            cseq: request.cseq.clone(),
            via: request.via.clone(),
            contacts: Vec::new(),
            record_routes: request.record_routes.clone(),
            body: Bytes::new(),
        }
    }

    pub fn with_contact(mut self, contact: Address) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn top_via(&self) -> Option<&Via> {
        self.via.first()
    }

    pub fn via_branch(&self) -> Option<&str> {
        self.top_via().and_then(|v| v.branch.as_deref())
    }
}

impl DialogHeaders for Response {
    fn from_tag(&self) -> Option<&str> {
        self.from.tag()
    }

    fn to_tag(&self) -> Option<&str> {
        self.to.tag()
    }

    fn call_id(&self) -> &str {
        &self.call_id
    }
}
