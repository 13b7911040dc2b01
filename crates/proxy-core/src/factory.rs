//! Outbound message construction.
//!
//! Every request or response object the engine sends is built here: fresh
//! dialog-initiating requests for UAC-role applications, the derived request
//! a branch sends downstream, the CANCEL for a branch being torn down, and
//! the synthesized upstream responses (100 Trying, 408 on timeout). Keeping
//! the construction in one place keeps the header rewriting rules out of the
//! state machines.

use std::sync::Arc;

use tracing::debug;

use sipfork_session_core::{AppSessionKey, RoutingTagComposer, SessionIdAllocator};
use sipfork_sip_types::{
    Address, CSeq, Method, ReasonInfo, Request, Response, StatusCode, Uri, Via, MAGIC_COOKIE,
};

use crate::errors::{ProxyError, ProxyResult};
use crate::transport::NetworkInterfaces;

/// Max-Forwards stamped on fresh requests and assumed when a forwarded
/// request arrives without one.
pub const DEFAULT_MAX_FORWARDS: u32 = 70;

/// Builds the request and response objects the engine sends.
pub struct RequestFactory {
    allocator: Arc<dyn SessionIdAllocator>,
    tags: RoutingTagComposer,
    interfaces: Arc<dyn NetworkInterfaces>,
}

impl RequestFactory {
    pub fn new(
        allocator: Arc<dyn SessionIdAllocator>,
        tags: RoutingTagComposer,
        interfaces: Arc<dyn NetworkInterfaces>,
    ) -> Self {
        RequestFactory {
            allocator,
            tags,
            interfaces,
        }
    }

    /// Builds a fresh dialog-initiating request on behalf of an application.
    ///
    /// ACK, CANCEL and PRACK are transaction-bound and never dialog-creating,
    /// so asking for one is rejected. The From tag carries the routing token
    /// for `app_key` unless the caller supplies its own tag; forbidden
    /// parameters (`tag` on the addresses, `method` on their URIs) are
    /// stripped from the given From/To before use.
    pub fn create_request(
        &self,
        app_key: &AppSessionKey,
        method: Method,
        from: Address,
        to: Address,
        call_id: Option<String>,
        from_tag: Option<String>,
    ) -> ProxyResult<Request> {
        if method.is_transaction_bound() {
            return Err(ProxyError::invalid_argument(format!(
                "{} requests cannot initiate a dialog",
                method
            )));
        }

        let mut from = sanitized(from);
        let to = sanitized(to);
        let tag = match from_tag {
            Some(tag) => tag,
            None => self.tags.encode(&app_key.application, &app_key.id)?,
        };
        from.set_tag(tag);

        let call_id = call_id.unwrap_or_else(|| self.allocator.next_id());
        let mut request = Request::new(method, to.uri.clone(), from, to, call_id);
        request.max_forwards = Some(DEFAULT_MAX_FORWARDS);
        if request.method.creates_dialog() {
            request
                .contacts
                .push(Address::new(self.interfaces.listening_uri(None)));
        }

        debug!(
            method = %request.method,
            call_id = %request.call_id,
            application = %app_key.application,
            "created dialog-initiating request"
        );
        Ok(request)
    }

    /// Derives the request one branch sends downstream: the original with
    /// the request-URI replaced by the target, Max-Forwards decremented and
    /// a fresh Via on top. Record-Route/Path URIs are inserted when the
    /// branch carries those flags.
    pub fn branch_request(
        &self,
        original: &Request,
        target: &Uri,
        via_branch: &str,
        record_route: Option<&Uri>,
        path: Option<&Uri>,
    ) -> Request {
        let mut request = original.clone();
        request.uri = target.clone();

        let hops = request.max_forwards.unwrap_or(DEFAULT_MAX_FORWARDS);
        request.max_forwards = Some(hops.saturating_sub(1));

        let listening = self.interfaces.listening_uri(None);
        let transport = target.transport().unwrap_or("udp").to_string();
        request.via.insert(
            0,
            Via::new(transport, listening.host_port()).with_branch(via_branch),
        );

        if let Some(uri) = record_route {
            request.record_routes.insert(0, uri.clone());
        }
        if let Some(uri) = path {
            request.paths.insert(0, uri.clone());
        }
        request
    }

    /// Builds the CANCEL for a previously sent request: same request-URI,
    /// From, To, Call-ID, top Via and CSeq number, method CANCEL, with the
    /// supplied reason values attached.
    pub fn cancel_request(&self, original: &Request, reasons: &[ReasonInfo]) -> Request {
        let mut cancel = Request::new(
            Method::Cancel,
            original.uri.clone(),
            original.from.clone(),
            original.to.clone(),
            original.call_id.clone(),
        );
        cancel.cseq = CSeq::new(original.cseq.sequence, Method::Cancel);
        cancel.via = original.top_via().cloned().into_iter().collect();
        cancel.routes = original.routes.clone();
        cancel.max_forwards = original.max_forwards;
        cancel.reasons = reasons.to_vec();
        cancel.initial = false;
        cancel
    }

    /// The upstream transform: pops this element's Via so the next element
    /// up sees its own Via on top.
    pub fn proxied_response(&self, response: &Response) -> Response {
        let mut upstream = response.clone();
        if !upstream.via.is_empty() {
            upstream.via.remove(0);
        }
        upstream
    }

    /// The single 100 sent upstream before any branch starts.
    pub fn trying_response(&self, original: &Request) -> Response {
        Response::to_request(StatusCode::TRYING, original)
    }

    /// The 408 synthesized when the winning branch timed out silently.
    pub fn timeout_response(&self, original: &Request) -> Response {
        Response::to_request(StatusCode::REQUEST_TIMEOUT, original)
    }

    /// A fresh Via branch identifier, magic cookie included.
    pub fn new_branch_id(&self) -> String {
        format!("{}{:016x}", MAGIC_COOKIE, rand::random::<u64>())
    }
}

fn sanitized(mut address: Address) -> Address {
    address.remove_tag();
    address.uri.remove_param("method");
    address
}
