//! Shared fixtures for forking-proxy integration tests.
//!
//! The harness wires a [`ProxyCore`] to a transport fake that records every
//! send, plus a real [`TokioTimerService`] whose events land on a channel the
//! test drains. Downstream responses are fed back by building them from the
//! recorded branch requests, exactly as a transaction layer would.

// not every test binary touches every helper
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use sipfork_proxy_core::{
    ProxyCore, ProxyEvent, ProxySettings, ProxyTransport, RequestFactory, StaticInterfaces,
    TokioTimerService, TransactionKey, TransportResult,
};
use sipfork_session_core::{
    InMemoryApplicationRegistry, RoutingTagComposer, UuidSessionIdAllocator,
};
use sipfork_sip_types::{Address, Method, Request, Response, StatusCode, Uri, Via};

/// One send the engine asked the transport to perform.
#[derive(Debug, Clone)]
pub enum Sent {
    Request(Request),
    Cancel(Request),
    Response(TransactionKey, Response),
    Stateless(Response),
}

/// Transport fake that records everything in send order.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Branch requests, in the order they were started.
    pub fn requests(&self) -> Vec<Request> {
        self.sent()
            .into_iter()
            .filter_map(|item| match item {
                Sent::Request(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn cancels(&self) -> Vec<Request> {
        self.sent()
            .into_iter()
            .filter_map(|item| match item {
                Sent::Cancel(cancel) => Some(cancel),
                _ => None,
            })
            .collect()
    }

    /// Responses sent upstream, transaction-bound and stateless alike.
    pub fn upstream(&self) -> Vec<Response> {
        self.sent()
            .into_iter()
            .filter_map(|item| match item {
                Sent::Response(_, response) | Sent::Stateless(response) => Some(response),
                _ => None,
            })
            .collect()
    }

    pub fn upstream_statuses(&self) -> Vec<StatusCode> {
        self.upstream().iter().map(|r| r.status).collect()
    }

    pub fn last_upstream(&self) -> Option<Response> {
        self.upstream().pop()
    }
}

#[async_trait]
impl ProxyTransport for RecordingTransport {
    async fn send_request(&self, request: &Request) -> TransportResult<()> {
        self.sent.lock().unwrap().push(Sent::Request(request.clone()));
        Ok(())
    }

    async fn send_cancel(&self, cancel: &Request) -> TransportResult<()> {
        self.sent.lock().unwrap().push(Sent::Cancel(cancel.clone()));
        Ok(())
    }

    async fn send_response(
        &self,
        key: &TransactionKey,
        response: &Response,
    ) -> TransportResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Response(key.clone(), response.clone()));
        Ok(())
    }

    async fn send_stateless(&self, response: &Response) -> TransportResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Stateless(response.clone()));
        Ok(())
    }
}

/// Installs the test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub core: ProxyCore,
    pub transport: Arc<RecordingTransport>,
    pub events: mpsc::Receiver<ProxyEvent>,
}

pub fn harness(settings: ProxySettings) -> Harness {
    harness_for(settings, invite())
}

pub fn harness_for(settings: ProxySettings, request: Request) -> Harness {
    init_tracing();
    let registry = Arc::new(InMemoryApplicationRegistry::new());
    registry.register("fork-test");
    let interfaces = Arc::new(StaticInterfaces::new(
        "sip:proxy.example.com:5060".parse().unwrap(),
    ));
    let factory = Arc::new(RequestFactory::new(
        Arc::new(UuidSessionIdAllocator),
        RoutingTagComposer::new(registry),
        interfaces.clone(),
    ));
    let transport = Arc::new(RecordingTransport::default());
    let (events_tx, events_rx) = mpsc::channel(64);
    let timers = Arc::new(TokioTimerService::new(events_tx));
    let core = ProxyCore::new(
        request,
        settings,
        transport.clone(),
        timers,
        interfaces,
        factory,
    )
    .unwrap();
    Harness {
        core,
        transport,
        events: events_rx,
    }
}

/// An initial INVITE as it would arrive from the upstream client.
pub fn invite() -> Request {
    let from = Address::new("sip:alice@example.com".parse().unwrap()).with_tag("a1");
    let to = Address::new("sip:bob@example.com".parse().unwrap());
    Request::new(
        Method::Invite,
        "sip:bob@example.com".parse().unwrap(),
        from,
        to,
        "call-fork-1",
    )
    .with_via(Via::new("udp", "client.example.com:5060").with_branch("z9hG4bKclient1"))
}

pub fn target(text: &str) -> Uri {
    text.parse().unwrap()
}

/// Builds the downstream response a target would send for `request`, along
/// with the client-transaction key the transaction layer would hand up.
pub fn respond(request: &Request, status: StatusCode) -> (TransactionKey, Response) {
    let response = Response::to_request(status, request);
    let key = TransactionKey::for_response(&response).unwrap();
    (key, response)
}

/// Same as [`respond`] but with redirect contacts attached.
pub fn redirect(request: &Request, contacts: &[Uri]) -> (TransactionKey, Response) {
    let (key, mut response) = respond(request, StatusCode::MOVED_TEMPORARILY);
    for contact in contacts {
        response.contacts.push(Address::new(contact.clone()));
    }
    (key, response)
}
