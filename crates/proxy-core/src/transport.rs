//! Transport and network-interface seams.
//!
//! The engine is transport-agnostic: everything that touches the wire goes
//! through [`ProxyTransport`], and everything that depends on where this
//! element listens goes through [`NetworkInterfaces`]. Embeddings implement
//! both against their SIP stack; tests implement them with recording fakes.
//!
//! Send failures surface as [`TransportError`]. The engine treats them as
//! advisory on the cancellation path (a branch being cancelled is marked
//! cancelled even when the CANCEL could not be sent) and as hard errors on
//! the forward path.

use async_trait::async_trait;
use thiserror::Error;

use sipfork_sip_types::{Request, Response, Uri};

use crate::transaction::TransactionKey;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by the wire-facing layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The message could not be handed to the network.
    #[error("send failed: {message}")]
    SendFailed { message: String },

    /// No usable route or socket toward the destination.
    #[error("destination unreachable: {destination}")]
    Unreachable { destination: String },
}

impl TransportError {
    pub fn send_failed(message: impl Into<String>) -> Self {
        TransportError::SendFailed {
            message: message.into(),
        }
    }

    pub fn unreachable(destination: impl Into<String>) -> Self {
        TransportError::Unreachable {
            destination: destination.into(),
        }
    }
}

/// Wire operations the engine needs from its hosting SIP stack.
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Sends a request downstream, opening a client transaction keyed by
    /// the request's top Via branch.
    async fn send_request(&self, request: &Request) -> TransportResult<()>;

    /// Sends a CANCEL for a previously sent request. The CANCEL carries the
    /// same top Via branch as the request it cancels.
    async fn send_cancel(&self, cancel: &Request) -> TransportResult<()>;

    /// Sends a response upstream on the server transaction named by `key`.
    async fn send_response(
        &self,
        key: &TransactionKey,
        response: &Response,
    ) -> TransportResult<()>;

    /// Forwards a response statelessly, routed by its remaining Via stack.
    /// Used for retransmissions that no longer match live state.
    async fn send_stateless(&self, response: &Response) -> TransportResult<()>;
}

/// Where this element listens and which interfaces it may send from.
pub trait NetworkInterfaces: Send + Sync {
    /// URI of the listening point for the given transport, or the default
    /// listening point when `transport` is `None`.
    fn listening_uri(&self, transport: Option<&str>) -> Uri;

    /// Every local interface URI requests may be sent from. Used to
    /// validate outbound-interface selection.
    fn outbound_interfaces(&self) -> Vec<Uri>;
}

/// Fixed interface set, for embeddings with one listening point.
#[derive(Debug, Clone)]
pub struct StaticInterfaces {
    listening: Uri,
    outbound: Vec<Uri>,
}

impl StaticInterfaces {
    pub fn new(listening: Uri) -> Self {
        let outbound = vec![listening.clone()];
        StaticInterfaces {
            listening,
            outbound,
        }
    }

    pub fn with_outbound(mut self, outbound: Vec<Uri>) -> Self {
        self.outbound = outbound;
        self
    }
}

impl NetworkInterfaces for StaticInterfaces {
    fn listening_uri(&self, transport: Option<&str>) -> Uri {
        match transport {
            Some(t) => self.listening.clone().with_param("transport", Some(t)),
            None => self.listening.clone(),
        }
    }

    fn outbound_interfaces(&self) -> Vec<Uri> {
        self.outbound.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let send = TransportError::send_failed("socket closed");
        assert_eq!(send.to_string(), "send failed: socket closed");

        let unreachable = TransportError::unreachable("sip:bob@example.com");
        assert_eq!(
            unreachable.to_string(),
            "destination unreachable: sip:bob@example.com"
        );
    }

    #[test]
    fn test_static_interfaces() {
        let listening: Uri = "sip:proxy.example.com:5060".parse().unwrap();
        let interfaces = StaticInterfaces::new(listening.clone());

        assert_eq!(interfaces.listening_uri(None), listening);
        let tcp = interfaces.listening_uri(Some("tcp"));
        assert_eq!(tcp.param("transport"), Some(Some("tcp")));
        assert_eq!(interfaces.outbound_interfaces(), vec![listening]);
    }
}
