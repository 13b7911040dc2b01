//! One outbound attempt toward one target.
//!
//! A branch owns the derived request it sends, the transaction keys it has
//! opened (the initial send plus any CANCEL), the response recorded so far
//! and its timer. The owning [`ProxyCore`](crate::proxy::ProxyCore) holds
//! every branch for one proxy operation and is the only caller of the
//! methods here; a branch never references its core back, so everything a
//! transition needs (transport, timers, factory) arrives as an argument.
//!
//! ```text
//!                 start()              final response
//!   UNSTARTED ────────────> STARTED ─────────────────> RESPONDED
//!       │                      │ │
//!       │ cancel()     timeout │ │ cancel() + 487
//!       └──────────> CANCELED  └─> TIMED_OUT
//! ```
//!
//! Provisional responses do not transition state; they restart the branch
//! timer at the full branch timeout, ending any 1xx deadline.

use std::time::Duration;

use tracing::{debug, warn};

use sipfork_sip_types::{Method, ReasonInfo, Request, Response, Uri};

use crate::errors::{ProxyError, ProxyResult};
use crate::events::ProxyEvent;
use crate::factory::RequestFactory;
use crate::timer::{TimerHandle, TimerService};
use crate::transaction::TransactionKey;
use crate::transport::ProxyTransport;

/// Where a branch stands in its lifecycle.
///
/// Derived from the flags rather than stored: `canceled` and `timed_out`
/// take precedence over a recorded final response, so a canceled branch
/// whose 487 has arrived still reads as `Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Unstarted,
    Started,
    Responded,
    TimedOut,
    Canceled,
}

/// One transaction this branch opened at the hosting transaction layer.
#[derive(Debug, Clone)]
pub struct BranchTransaction {
    pub key: TransactionKey,
    pub request: Request,
}

/// One outbound attempt toward one target URI.
#[derive(Debug)]
pub struct ProxyBranch {
    target: Uri,
    outbound_request: Request,
    transactions: Vec<BranchTransaction>,
    last_response: Option<Response>,
    started: bool,
    canceled: bool,
    timed_out: bool,
    terminated: bool,
    record_route: bool,
    recurse: bool,
    add_to_path: bool,
    timeout: Duration,
    timeout_1xx: Option<Duration>,
    timer: Option<TimerHandle>,
    recursed_targets: Vec<Uri>,
}

impl ProxyBranch {
    pub(crate) fn new(
        target: Uri,
        outbound_request: Request,
        timeout: Duration,
        timeout_1xx: Option<Duration>,
        record_route: bool,
        recurse: bool,
        add_to_path: bool,
    ) -> Self {
        ProxyBranch {
            target,
            outbound_request,
            transactions: Vec::new(),
            last_response: None,
            started: false,
            canceled: false,
            timed_out: false,
            terminated: false,
            record_route,
            recurse,
            add_to_path,
            timeout,
            timeout_1xx,
            timer: None,
            recursed_targets: Vec::new(),
        }
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn outbound_request(&self) -> &Request {
        &self.outbound_request
    }

    pub fn transactions(&self) -> &[BranchTransaction] {
        &self.transactions
    }

    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn canceled(&self) -> bool {
        self.canceled
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn terminated(&self) -> bool {
        self.terminated
    }

    pub fn record_route(&self) -> bool {
        self.record_route
    }

    pub fn recurse(&self) -> bool {
        self.recurse
    }

    pub fn add_to_path(&self) -> bool {
        self.add_to_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn recursed_targets(&self) -> &[Uri] {
        &self.recursed_targets
    }

    pub fn state(&self) -> BranchState {
        if self.canceled {
            BranchState::Canceled
        } else if self.timed_out {
            BranchState::TimedOut
        } else if self.has_final_response() {
            BranchState::Responded
        } else if self.started {
            BranchState::Started
        } else {
            BranchState::Unstarted
        }
    }

    pub fn has_final_response(&self) -> bool {
        self.last_response
            .as_ref()
            .is_some_and(|response| response.status.is_final())
    }

    /// Whether `key` names a transaction this branch opened.
    pub fn matches_transaction(&self, key: &TransactionKey) -> bool {
        self.transactions.iter().any(|entry| &entry.key == key)
    }

    /// Whether `via_branch` is the Via branch id of one of this branch's
    /// transactions.
    pub fn has_transaction_branch(&self, via_branch: &str) -> bool {
        self.transactions
            .iter()
            .any(|entry| entry.key.branch() == via_branch)
    }

    /// Sends the outbound request and arms the branch timer.
    ///
    /// The first timer runs at the 1xx timeout when one is configured,
    /// otherwise at the branch timeout.
    pub(crate) async fn start(
        &mut self,
        transport: &dyn ProxyTransport,
        timers: &dyn TimerService,
    ) -> ProxyResult<()> {
        if self.started {
            return Err(ProxyError::invalid_state(format!(
                "branch {} already started",
                self.target
            )));
        }
        if self.canceled {
            return Err(ProxyError::invalid_state(format!(
                "branch {} was canceled before starting",
                self.target
            )));
        }
        if self.timed_out {
            return Err(ProxyError::invalid_state(format!(
                "branch {} already timed out",
                self.target
            )));
        }
        let key = TransactionKey::for_request(&self.outbound_request, false).ok_or_else(|| {
            ProxyError::invalid_state(format!(
                "outbound request for {} carries no via branch",
                self.target
            ))
        })?;

        transport.send_request(&self.outbound_request).await?;
        self.started = true;
        self.transactions.push(BranchTransaction {
            key,
            request: self.outbound_request.clone(),
        });
        let first_timeout = self.timeout_1xx.unwrap_or(self.timeout);
        self.schedule_timer(timers, first_timeout);
        debug!(target = %self.target, timeout = ?first_timeout, "branch started");
        Ok(())
    }

    /// Records a provisional response and restarts the branch timer at the
    /// full branch timeout.
    pub(crate) fn record_provisional(&mut self, response: Response, timers: &dyn TimerService) {
        if self.canceled || self.timed_out {
            return;
        }
        self.last_response = Some(response);
        if self.started {
            self.schedule_timer(timers, self.timeout);
        }
    }

    /// Records a final response and stops the branch timer. Returns false
    /// when the branch already reached a terminal response or timed out, in
    /// which case the response must not re-enter aggregation.
    pub(crate) fn record_final(&mut self, response: Response) -> bool {
        if self.timed_out || self.has_final_response() {
            return false;
        }
        self.cancel_timer();
        self.last_response = Some(response);
        true
    }

    /// Marks the branch timed out. Returns false when the event is stale
    /// (terminal outcome already recorded, or the branch never started).
    pub(crate) fn mark_timed_out(&mut self) -> bool {
        if self.timed_out || self.canceled || self.has_final_response() || !self.started {
            return false;
        }
        self.cancel_timer();
        self.timed_out = true;
        true
    }

    /// Requests cancellation of this branch.
    ///
    /// An unstarted branch is marked canceled so it can never start. A
    /// canceled or timed-out branch is left alone. A branch that already
    /// holds a final response refuses with an invalid-state error. A started
    /// non-INVITE branch cannot be cancelled on the wire and is left to
    /// complete on its own. Otherwise a CANCEL is sent on the branch's
    /// transaction; a send failure is logged and the branch is still marked
    /// canceled, since the timeout path will reap it either way.
    pub(crate) async fn cancel(
        &mut self,
        reasons: &[ReasonInfo],
        transport: &dyn ProxyTransport,
        factory: &RequestFactory,
    ) -> ProxyResult<()> {
        if self.canceled || self.timed_out {
            return Ok(());
        }
        if !self.started {
            self.canceled = true;
            self.cancel_timer();
            debug!(target = %self.target, "branch canceled before start");
            return Ok(());
        }
        if self.has_final_response() {
            return Err(ProxyError::invalid_state(format!(
                "branch {} already completed",
                self.target
            )));
        }
        if self.outbound_request.method != Method::Invite {
            debug!(
                target = %self.target,
                method = %self.outbound_request.method,
                "cancel ignored for non-INVITE branch"
            );
            return Ok(());
        }

        self.cancel_timer();
        let cancel = factory.cancel_request(&self.outbound_request, reasons);
        if let Some(key) = TransactionKey::for_request(&cancel, false) {
            self.transactions.push(BranchTransaction {
                key,
                request: cancel.clone(),
            });
        }
        if let Err(error) = transport.send_cancel(&cancel).await {
            warn!(target = %self.target, %error, "failed to send CANCEL");
        }
        self.canceled = true;
        debug!(target = %self.target, "branch canceled");
        Ok(())
    }

    /// Applies a new branch timeout. A live branch gets its timer rearmed at
    /// the new value.
    pub(crate) fn set_timeout(&mut self, timeout: Duration, timers: &dyn TimerService) {
        self.timeout = timeout;
        if self.started && !self.timed_out && !self.canceled && !self.has_final_response() {
            self.schedule_timer(timers, timeout);
        }
    }

    /// Releases the branch's timer once its outcome no longer matters to
    /// the proxy operation.
    pub(crate) fn terminate(&mut self) {
        self.cancel_timer();
        self.terminated = true;
    }

    pub(crate) fn add_recursed_target(&mut self, target: Uri) {
        self.recursed_targets.push(target);
    }

    fn schedule_timer(&mut self, timers: &dyn TimerService, delay: Duration) {
        self.cancel_timer();
        let event = ProxyEvent::BranchTimedOut {
            target: self.target.clone(),
        };
        self.timer = Some(timers.schedule(delay, event));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
