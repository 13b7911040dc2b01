//! Forking and response aggregation for one proxied request.
//!
//! A [`ProxyCore`] owns every branch spawned for one original request and
//! is the single place its outcome is decided:
//!
//! ```text
//!                   ┌──────────────┐
//!   original ─────> │  ProxyCore   │────> branch 1 ──> target A
//!   request         │              │────> branch 2 ──> target B
//!                   │  best        │────> branch 3 ──> target C
//!   final    <───── │  response    │<──── responses / timeouts
//!   response        └──────────────┘
//! ```
//!
//! Branch callbacks ([`on_response`](ProxyCore::on_response),
//! [`on_branch_timeout`](ProxyCore::on_branch_timeout)) are the only
//! mutation entry points; every method takes `&mut self`, so wrapping one
//! core in a `tokio::sync::Mutex` serializes an operation end to end. Once
//! the final response has gone upstream the original request is cleared,
//! which is what makes a duplicate final send impossible: retransmissions
//! arriving afterwards find no live state and are forwarded statelessly.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use sipfork_sip_types::{Method, ReasonInfo, Request, Response, StatusCode, Uri};

use crate::branch::{BranchState, ProxyBranch};
use crate::errors::{ProxyError, ProxyResult};
use crate::events::ProxyEvent;
use crate::factory::RequestFactory;
use crate::settings::ProxySettings;
use crate::snapshot::ProxySnapshot;
use crate::timer::TimerService;
use crate::transaction::TransactionKey;
use crate::transport::{NetworkInterfaces, ProxyTransport};

/// Drives the forking of one original request and aggregates the outcome.
pub struct ProxyCore {
    original_request: Option<Request>,
    branches: Vec<ProxyBranch>,
    best_response: Option<Response>,
    best_branch: Option<Uri>,
    settings: ProxySettings,
    started: bool,
    ack_received: bool,
    trying_sent: bool,
    record_route_uri: Option<Uri>,
    path_uri: Option<Uri>,
    outbound_interface: Option<Uri>,
    previous_node: Option<Uri>,
    caller_from: Option<String>,
    upstream_transaction: Option<TransactionKey>,
    final_branch: Option<Uri>,
    transport: Arc<dyn ProxyTransport>,
    timers: Arc<dyn TimerService>,
    interfaces: Arc<dyn NetworkInterfaces>,
    factory: Arc<RequestFactory>,
}

impl ProxyCore {
    pub fn new(
        original_request: Request,
        settings: ProxySettings,
        transport: Arc<dyn ProxyTransport>,
        timers: Arc<dyn TimerService>,
        interfaces: Arc<dyn NetworkInterfaces>,
        factory: Arc<RequestFactory>,
    ) -> ProxyResult<Self> {
        settings.validate().map_err(ProxyError::invalid_argument)?;
        let upstream_transaction = TransactionKey::for_request(&original_request, true);
        let previous_node = previous_node_of(&original_request);
        let caller_from = Some(original_request.from.uri.to_string());
        Ok(ProxyCore {
            original_request: Some(original_request),
            branches: Vec::new(),
            best_response: None,
            best_branch: None,
            settings,
            started: false,
            ack_received: false,
            trying_sent: false,
            record_route_uri: None,
            path_uri: None,
            outbound_interface: None,
            previous_node,
            caller_from,
            upstream_transaction,
            final_branch: None,
            transport,
            timers,
            interfaces,
            factory,
        })
    }

    /// Rebuilds a core from a failover snapshot. The branch map starts
    /// empty and there is no original request: the restored core serves
    /// in-dialog correlation, not a replay of the forking.
    pub fn restore(
        snapshot: ProxySnapshot,
        transport: Arc<dyn ProxyTransport>,
        timers: Arc<dyn TimerService>,
        interfaces: Arc<dyn NetworkInterfaces>,
        factory: Arc<RequestFactory>,
    ) -> Self {
        ProxyCore {
            original_request: None,
            branches: Vec::new(),
            best_response: None,
            best_branch: None,
            settings: snapshot.settings,
            started: snapshot.started,
            ack_received: snapshot.ack_received,
            trying_sent: snapshot.trying_sent,
            record_route_uri: None,
            path_uri: None,
            outbound_interface: None,
            previous_node: snapshot.previous_node,
            caller_from: snapshot.caller_from,
            upstream_transaction: None,
            final_branch: snapshot.final_branch,
            transport,
            timers,
            interfaces,
            factory,
        }
    }

    /// Captures the fields that survive failover.
    pub fn snapshot(&self) -> ProxySnapshot {
        ProxySnapshot {
            settings: self.settings.clone(),
            started: self.started,
            ack_received: self.ack_received,
            trying_sent: self.trying_sent,
            previous_node: self.previous_node.clone(),
            caller_from: self.caller_from.clone(),
            final_branch: self.final_branch.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Target management
    // ------------------------------------------------------------------

    /// Creates one branch per target without starting any of them.
    ///
    /// The whole batch is validated first: one bad target fails the call
    /// and leaves the branch map untouched. A duplicate target replaces the
    /// existing branch in place, keeping its position in the fork order.
    pub fn add_targets(&mut self, targets: Vec<Uri>) -> ProxyResult<()> {
        self.original()?;
        for target in &targets {
            validate_target(target)?;
        }
        let record_route = self.settings.record_route;
        let recurse = self.settings.recurse;
        let add_to_path = self.settings.add_to_path;
        for target in targets {
            self.create_branch(target, record_route, recurse, add_to_path)?;
        }
        Ok(())
    }

    /// [`add_targets`](Self::add_targets) followed by [`start`](Self::start).
    pub async fn proxy_to(&mut self, targets: Vec<Uri>) -> ProxyResult<()> {
        self.add_targets(targets)?;
        self.start().await
    }

    /// Begins the fork: sends the single upstream 100 for an INVITE, then
    /// starts every unstarted branch (parallel) or the first one
    /// (sequential).
    ///
    /// Only the dialog-initiating request may be forked, and never after an
    /// ACK has been seen.
    pub async fn start(&mut self) -> ProxyResult<()> {
        if !self.original()?.initial {
            return Err(ProxyError::invalid_state(
                "only the initial request of a dialog may be forked",
            ));
        }
        if self.ack_received {
            return Err(ProxyError::invalid_state(
                "cannot fork after an ACK has been received",
            ));
        }
        self.started = true;

        if self.original()?.method == Method::Invite && !self.trying_sent {
            self.trying_sent = true;
            let trying = self.factory.trying_response(self.original()?);
            self.send_upstream_best_effort(&trying).await;
        }

        if self.settings.parallel {
            self.start_unstarted_branches().await
        } else {
            self.start_next_inner().await
        }
    }

    /// Starts the next branch in fork order that has not been tried yet.
    /// Sequential mode only.
    pub async fn start_next_untried_branch(&mut self) -> ProxyResult<()> {
        if self.settings.parallel {
            return Err(ProxyError::invalid_state(
                "next-branch scheduling only applies to sequential forking",
            ));
        }
        self.start_next_inner().await
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Cancels every branch.
    pub async fn cancel(&mut self) -> ProxyResult<()> {
        self.cancel_branches(None, &[], true).await
    }

    /// Cancels every branch, attaching the given reason values to each
    /// CANCEL.
    pub async fn cancel_with_reasons(&mut self, reasons: &[ReasonInfo]) -> ProxyResult<()> {
        self.cancel_branches(None, reasons, true).await
    }

    /// Cancels every branch except the one targeting `excluded`.
    pub async fn cancel_all_except(
        &mut self,
        excluded: Option<&Uri>,
        reasons: &[ReasonInfo],
    ) -> ProxyResult<()> {
        self.cancel_branches(excluded, reasons, true).await
    }

    async fn cancel_branches(
        &mut self,
        excluded: Option<&Uri>,
        reasons: &[ReasonInfo],
        propagate: bool,
    ) -> ProxyResult<()> {
        if self.ack_received {
            return Err(ProxyError::invalid_state(
                "cannot cancel after an ACK has been received",
            ));
        }
        let transport = self.transport.clone();
        let factory = self.factory.clone();
        for branch in &mut self.branches {
            if excluded.is_some_and(|target| branch.target() == target) {
                continue;
            }
            match branch
                .cancel(reasons, transport.as_ref(), factory.as_ref())
                .await
            {
                Ok(()) => {}
                Err(error) => {
                    if propagate {
                        return Err(error);
                    }
                    debug!(
                        target = %branch.target(),
                        %error,
                        "branch refused cancellation; skipped"
                    );
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Response and timeout entry points
    // ------------------------------------------------------------------

    /// Routes a downstream response to the branch that opened `key`'s
    /// transaction.
    ///
    /// Responses that match no live branch after the final response went
    /// upstream are retransmissions: they are transformed and forwarded
    /// statelessly with no state change.
    pub async fn on_response(
        &mut self,
        key: &TransactionKey,
        response: Response,
    ) -> ProxyResult<()> {
        let Some(index) = self
            .branches
            .iter()
            .position(|branch| branch.matches_transaction(key))
        else {
            if self.original_request.is_none() {
                debug!(
                    status = %response.status,
                    "no live state for response; forwarding statelessly"
                );
                let upstream = self.factory.proxied_response(&response);
                return self
                    .transport
                    .send_stateless(&upstream)
                    .await
                    .map_err(Into::into);
            }
            warn!(%key, status = %response.status, "response for unknown transaction dropped");
            return Ok(());
        };

        if response.status.is_provisional() {
            if self.branches[index].canceled() || self.branches[index].timed_out() {
                debug!(
                    target = %self.branches[index].target(),
                    status = %response.status,
                    "provisional on dead branch ignored"
                );
                return Ok(());
            }
            // 100s are hop-by-hop; other provisionals go upstream best effort
            let upstream = (response.status != StatusCode::TRYING)
                .then(|| self.factory.proxied_response(&response));
            let timers = self.timers.clone();
            self.branches[index].record_provisional(response, timers.as_ref());
            if let Some(upstream) = upstream {
                self.send_upstream_best_effort(&upstream).await;
            }
            return Ok(());
        }

        let target = self.branches[index].target().clone();
        if response.cseq.method == Method::Cancel {
            // answer to our CANCEL; the INVITE's 487 arrives separately
            debug!(%target, status = %response.status, "cancel transaction completed");
            return Ok(());
        }
        if !self.branches[index].record_final(response) {
            debug!(%target, "stale final response ignored");
            return Ok(());
        }
        self.on_final_response(&target).await
    }

    /// Aggregates the final response recorded on the branch for `target`.
    ///
    /// Winning-response side effects happen here: a 2xx/6xx in parallel
    /// mode cancels the other branches, a 3xx with recursion enabled forks
    /// onto its contacts, and completion is checked per the current mode.
    pub async fn on_final_response(&mut self, target: &Uri) -> ProxyResult<()> {
        let index = self
            .branch_index(target)
            .ok_or_else(|| ProxyError::invalid_argument(format!("no branch for {}", target)))?;
        let response = match self.branches[index].last_response() {
            Some(response) if response.status.is_final() => response.clone(),
            _ => {
                return Err(ProxyError::invalid_state(format!(
                    "branch {} holds no final response",
                    target
                )));
            }
        };
        let status = response.status;
        debug!(%target, %status, "final response recorded");

        if !self.settings.supervised {
            // unsupervised proxies hand the first final straight through
            self.best_response = Some(response);
            self.best_branch = Some(target.clone());
            return self.send_final_response().await;
        }

        if self.settings.parallel
            && !self.settings.no_cancel
            && (status.is_success() || status.class() == 6)
        {
            self.cancel_branches(Some(target), &[], false).await?;
        }

        if status.is_redirect() && self.branches[index].recurse() && !response.contacts.is_empty()
        {
            self.recurse_on_redirect(index, &response).await?;
        }

        self.record_best(target, response);

        if self.settings.parallel {
            if self.all_responses_arrived() {
                self.send_final_response().await?;
            }
        } else {
            let best_is_success = self
                .best_response
                .as_ref()
                .is_some_and(|best| best.status.is_success());
            if best_is_success || self.all_responses_arrived() {
                self.send_final_response().await?;
            } else {
                self.branches[index].terminate();
                self.start_next_inner().await?;
            }
        }
        Ok(())
    }

    /// Handles a branch timer expiration. The timed-out branch becomes the
    /// best branch when none is recorded yet, leaving the best response
    /// empty so finalization synthesizes a 408.
    pub async fn on_branch_timeout(&mut self, target: &Uri) -> ProxyResult<()> {
        let Some(index) = self.branch_index(target) else {
            debug!(%target, "timeout for unknown branch ignored");
            return Ok(());
        };
        if !self.branches[index].mark_timed_out() {
            debug!(%target, "stale branch timeout ignored");
            return Ok(());
        }
        warn!(%target, "branch timed out");

        if self.best_branch.is_none() {
            self.best_branch = Some(target.clone());
        }
        if self.all_responses_arrived() {
            return self.send_final_response().await;
        }
        if !self.settings.parallel {
            self.branches[index].terminate();
            return self.start_next_inner().await;
        }
        Ok(())
    }

    /// Dispatches a timer event into the matching handler.
    pub async fn on_event(&mut self, event: ProxyEvent) -> ProxyResult<()> {
        match event {
            ProxyEvent::BranchTimedOut { target } => self.on_branch_timeout(&target).await,
        }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn set_parallel(&mut self, parallel: bool) {
        self.settings.parallel = parallel;
    }

    pub fn set_recurse(&mut self, recurse: bool) {
        self.settings.recurse = recurse;
    }

    pub fn set_supervised(&mut self, supervised: bool) {
        self.settings.supervised = supervised;
    }

    pub fn set_no_cancel(&mut self, no_cancel: bool) {
        self.settings.no_cancel = no_cancel;
    }

    /// Enables or disables record-routing. The route URI is built once, on
    /// first enabling; flipping the flag after the fork started would strand
    /// branches built without it, so that is refused.
    pub fn set_record_route(&mut self, record_route: bool) -> ProxyResult<()> {
        if self.started {
            return Err(ProxyError::invalid_state(
                "record-route cannot change after the fork started",
            ));
        }
        self.settings.record_route = record_route;
        if record_route {
            self.ensure_record_route_uri();
        }
        Ok(())
    }

    /// Enables or disables Path insertion, with the same freeze-after-start
    /// rule as record-routing.
    pub fn set_add_to_path(&mut self, add_to_path: bool) -> ProxyResult<()> {
        if self.started {
            return Err(ProxyError::invalid_state(
                "path insertion cannot change after the fork started",
            ));
        }
        self.settings.add_to_path = add_to_path;
        if add_to_path {
            self.ensure_path_uri();
        }
        Ok(())
    }

    /// Applies a new overall timeout and propagates it to every branch that
    /// has not already timed out or been canceled.
    pub fn set_proxy_timeout(&mut self, timeout: Duration) -> ProxyResult<()> {
        if timeout.is_zero() {
            return Err(ProxyError::invalid_argument("proxy timeout must be positive"));
        }
        self.settings.proxy_timeout = timeout;
        let timers = self.timers.clone();
        for branch in &mut self.branches {
            if !branch.timed_out() && !branch.canceled() {
                branch.set_timeout(timeout, timers.as_ref());
            }
        }
        Ok(())
    }

    pub fn set_sequential_search_timeout(&mut self, timeout: Duration) -> ProxyResult<()> {
        if timeout.is_zero() {
            return Err(ProxyError::invalid_argument(
                "sequential search timeout must be positive",
            ));
        }
        self.settings.sequential_search_timeout = Some(timeout);
        Ok(())
    }

    /// Selects the local interface requests are sent from. The URI must be
    /// one the network layer advertises.
    pub fn set_outbound_interface(&mut self, uri: Uri) -> ProxyResult<()> {
        if !self.interfaces.outbound_interfaces().contains(&uri) {
            return Err(ProxyError::invalid_argument(format!(
                "not a local outbound interface: {}",
                uri
            )));
        }
        self.outbound_interface = Some(uri);
        Ok(())
    }

    pub fn set_ack_received(&mut self, received: bool) {
        self.ack_received = received;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn ack_received(&self) -> bool {
        self.ack_received
    }

    pub fn original_request(&self) -> Option<&Request> {
        self.original_request.as_ref()
    }

    pub fn branches(&self) -> &[ProxyBranch] {
        &self.branches
    }

    pub fn branch(&self, target: &Uri) -> Option<&ProxyBranch> {
        self.branch_index(target).map(|index| &self.branches[index])
    }

    pub fn best_response(&self) -> Option<&Response> {
        self.best_response.as_ref()
    }

    /// Target of the branch chosen for subsequent in-dialog requests, once
    /// the final response went upstream.
    pub fn final_branch(&self) -> Option<&Uri> {
        self.final_branch.as_ref()
    }

    /// The node the original request arrived from.
    pub fn previous_node(&self) -> Option<&Uri> {
        self.previous_node.as_ref()
    }

    /// From-URI of the original request, used to tell caller-to-callee
    /// traffic from the reverse direction on in-dialog requests.
    pub fn caller_from(&self) -> Option<&str> {
        self.caller_from.as_deref()
    }

    pub fn upstream_transaction(&self) -> Option<&TransactionKey> {
        self.upstream_transaction.as_ref()
    }

    pub fn outbound_interface(&self) -> Option<&Uri> {
        self.outbound_interface.as_ref()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn original(&self) -> ProxyResult<&Request> {
        self.original_request
            .as_ref()
            .ok_or_else(|| ProxyError::invalid_state("final response already sent"))
    }

    fn branch_index(&self, target: &Uri) -> Option<usize> {
        self.branches
            .iter()
            .position(|branch| branch.target() == target)
    }

    fn create_branch(
        &mut self,
        target: Uri,
        record_route: bool,
        recurse: bool,
        add_to_path: bool,
    ) -> ProxyResult<()> {
        let record_route_uri = if record_route {
            Some(self.ensure_record_route_uri())
        } else {
            None
        };
        let path_uri = if add_to_path {
            Some(self.ensure_path_uri())
        } else {
            None
        };
        let original = self.original()?.clone();
        let via_branch = self.factory.new_branch_id();
        let outbound = self.factory.branch_request(
            &original,
            &target,
            &via_branch,
            record_route_uri.as_ref(),
            path_uri.as_ref(),
        );
        let branch = ProxyBranch::new(
            target,
            outbound,
            self.settings.branch_timeout(),
            self.settings.timeout_1xx,
            record_route,
            recurse,
            add_to_path,
        );
        self.insert_branch(branch);
        Ok(())
    }

    fn insert_branch(&mut self, branch: ProxyBranch) {
        match self.branch_index(branch.target()) {
            Some(index) => {
                debug!(target = %branch.target(), "replacing branch for duplicate target");
                let mut old = std::mem::replace(&mut self.branches[index], branch);
                old.terminate();
            }
            None => self.branches.push(branch),
        }
    }

    async fn start_unstarted_branches(&mut self) -> ProxyResult<()> {
        let transport = self.transport.clone();
        let timers = self.timers.clone();
        for branch in &mut self.branches {
            if branch.state() == BranchState::Unstarted {
                branch.start(transport.as_ref(), timers.as_ref()).await?;
            }
        }
        Ok(())
    }

    async fn start_next_inner(&mut self) -> ProxyResult<()> {
        let transport = self.transport.clone();
        let timers = self.timers.clone();
        for branch in &mut self.branches {
            if branch.state() == BranchState::Unstarted {
                return branch.start(transport.as_ref(), timers.as_ref()).await;
            }
        }
        Ok(())
    }

    /// The aggregation rule. A new response displaces the best when there
    /// is none yet, or when it is strictly lower-numbered and below 400.
    /// Among failures (>= 400) the first arrival therefore sticks, while
    /// among success/redirect candidates the lowest status wins.
    fn record_best(&mut self, target: &Uri, response: Response) {
        let replace = match &self.best_response {
            None => true,
            Some(best) => response.status < best.status && response.status.as_u16() < 400,
        };
        if replace {
            debug!(%target, status = %response.status, "new best response");
            self.best_response = Some(response);
            self.best_branch = Some(target.clone());
        }
    }

    /// Whether every branch reached a terminal outcome. Canceled and
    /// timed-out branches count as arrived; unstarted branches (recursed
    /// children waiting for the sequential scheduler included) block
    /// completion.
    fn all_responses_arrived(&self) -> bool {
        self.branches.iter().all(|branch| {
            matches!(
                branch.state(),
                BranchState::Responded | BranchState::TimedOut | BranchState::Canceled
            )
        })
    }

    async fn recurse_on_redirect(&mut self, parent: usize, response: &Response) -> ProxyResult<()> {
        let record_route = self.branches[parent].record_route();
        let add_to_path = self.branches[parent].add_to_path();
        let parent_target = self.branches[parent].target().clone();

        let mut children = Vec::new();
        for contact in &response.contacts {
            if !contact.uri.scheme.is_supported() {
                warn!(
                    parent = %parent_target,
                    contact = %contact.uri,
                    "skipping redirect contact with unsupported scheme"
                );
                continue;
            }
            if contact.uri == parent_target {
                warn!(parent = %parent_target, "redirect loops back to its own target; skipped");
                continue;
            }
            children.push(contact.uri.clone());
        }
        if children.is_empty() {
            return Ok(());
        }

        info!(parent = %parent_target, count = children.len(), "recursing on redirect");
        for child in children {
            self.create_branch(child.clone(), record_route, true, add_to_path)?;
            if let Some(parent_index) = self.branch_index(&parent_target) {
                self.branches[parent_index].add_recursed_target(child);
            }
        }
        // parallel mode starts children immediately; sequential leaves them
        // for the scheduler
        if self.settings.parallel && self.started {
            self.start_unstarted_branches().await?;
        }
        Ok(())
    }

    /// Emits the single final response upstream and clears the operation.
    ///
    /// Clearing happens before the send completes, so a reentrant callback
    /// or a transport failure can never produce a second final send; the
    /// retransmission path takes over from here.
    async fn send_final_response(&mut self) -> ProxyResult<()> {
        let Some(original) = self.original_request.take() else {
            return Ok(());
        };
        let best_target = self.best_branch.take();
        let best_response = self.best_response.take();

        let upstream = match &best_response {
            Some(response) => self.factory.proxied_response(response),
            None => self.factory.timeout_response(&original),
        };

        if let (Some(response), Some(target)) = (&best_response, &best_target) {
            let recorded = self.branch_index(target).is_some_and(|index| {
                response
                    .via_branch()
                    .map(|id| self.branches[index].has_transaction_branch(id))
                    .unwrap_or(false)
            });
            if !recorded {
                warn!(
                    %target,
                    "winning response does not match a recorded branch transaction"
                );
            }
        }

        for branch in &mut self.branches {
            branch.terminate();
        }
        self.branches.clear();
        self.final_branch = best_target;

        info!(status = %upstream.status, "sending final response upstream");
        let result = match &self.upstream_transaction {
            Some(key) => self.transport.send_response(key, &upstream).await,
            None => self.transport.send_stateless(&upstream).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(%error, "failed to send final response upstream");
                Err(error.into())
            }
        }
    }

    async fn send_upstream_best_effort(&self, response: &Response) {
        let result = match &self.upstream_transaction {
            Some(key) => self.transport.send_response(key, response).await,
            None => self.transport.send_stateless(response).await,
        };
        if let Err(error) = result {
            warn!(status = %response.status, %error, "failed to send response upstream");
        }
    }

    fn ensure_record_route_uri(&mut self) -> Uri {
        if let Some(uri) = &self.record_route_uri {
            return uri.clone();
        }
        let uri = self.listening_uri_for_original().with_param("lr", None);
        self.record_route_uri = Some(uri.clone());
        uri
    }

    fn ensure_path_uri(&mut self) -> Uri {
        if let Some(uri) = &self.path_uri {
            return uri.clone();
        }
        let uri = self.listening_uri_for_original().with_param("lr", None);
        self.path_uri = Some(uri.clone());
        uri
    }

    fn listening_uri_for_original(&self) -> Uri {
        let transport = self
            .original_request
            .as_ref()
            .and_then(|request| request.top_via())
            .map(|via| via.transport.to_ascii_lowercase());
        self.interfaces.listening_uri(transport.as_deref())
    }
}

impl fmt::Debug for ProxyCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCore")
            .field("branches", &self.branches.len())
            .field("started", &self.started)
            .field("ack_received", &self.ack_received)
            .field("trying_sent", &self.trying_sent)
            .field("best_branch", &self.best_branch)
            .field("final_branch", &self.final_branch)
            .finish_non_exhaustive()
    }
}

fn validate_target(target: &Uri) -> ProxyResult<()> {
    if !target.scheme.is_supported() {
        return Err(ProxyError::invalid_argument(format!(
            "unsupported target scheme: {}",
            target
        )));
    }
    if target.host.is_empty() {
        return Err(ProxyError::invalid_argument("target host is empty"));
    }
    Ok(())
}

/// The node the original request arrived from: the top Record-Route entry
/// when one is present, otherwise the last Via's sent-by with the Via
/// transport. Extraction failures leave the field unset.
fn previous_node_of(request: &Request) -> Option<Uri> {
    if let Some(route) = request.record_routes.first() {
        return Some(route.clone());
    }
    let via = request.via.last()?;
    let transport = if via.transport.is_empty() {
        "udp".to_string()
    } else {
        via.transport.to_ascii_lowercase()
    };
    let text = format!("sip:{};transport={}", via.sent_by, transport);
    match text.parse::<Uri>() {
        Ok(uri) => Some(uri),
        Err(error) => {
            warn!(%error, sent_by = %via.sent_by, "could not derive previous node from via");
            None
        }
    }
}
