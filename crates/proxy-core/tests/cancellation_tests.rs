//! Cancellation scenarios
//!
//! CANCEL fan-out driven by the application: which branches get a CANCEL,
//! what the CANCEL carries, and how the 200/487 pair that follows is
//! handled.

mod common;

use common::{harness, respond, target};

use tokio::time::{timeout, Duration};

use sipfork_proxy_core::{BranchState, ProxySettings, TransactionKey};
use sipfork_sip_types::{Method, ReasonInfo, Response, StatusCode};

/// Canceling the fork sends one CANCEL per started branch, each on the
/// branch's own transaction, and the 487s that follow finish the operation.
#[tokio::test]
async fn test_cancel_fans_out_and_487_completes() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    h.core.cancel().await.unwrap();

    let requests = h.transport.requests();
    let cancels = h.transport.cancels();
    assert_eq!(cancels.len(), 2);
    for (request, cancel) in requests.iter().zip(&cancels) {
        assert_eq!(cancel.method, Method::Cancel);
        assert_eq!(cancel.uri, request.uri);
        assert_eq!(cancel.via_branch(), request.via_branch());
        assert_eq!(cancel.cseq.sequence, request.cseq.sequence);
        assert_eq!(cancel.cseq.method, Method::Cancel);
        assert!(cancel.reasons.is_empty());
        assert!(!cancel.initial);
    }

    // canceling again changes nothing
    h.core.cancel().await.unwrap();
    assert_eq!(h.transport.cancels().len(), 2);

    for request in &requests {
        let (key, terminated) = respond(request, StatusCode::REQUEST_TERMINATED);
        h.core.on_response(&key, terminated).await.unwrap();
    }
    assert_eq!(
        h.transport.last_upstream().unwrap().status,
        StatusCode::REQUEST_TERMINATED,
    );
    assert!(h.core.branches().is_empty());
}

/// Reason values ride on every CANCEL in the fan-out.
#[tokio::test]
async fn test_cancel_carries_reason_values() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let reasons = vec![ReasonInfo::call_completed_elsewhere()];
    h.core.cancel_with_reasons(&reasons).await.unwrap();

    let cancels = h.transport.cancels();
    assert_eq!(cancels.len(), 2);
    for cancel in &cancels {
        assert_eq!(cancel.reasons, reasons);
        assert_eq!(cancel.reasons[0].protocol, "SIP");
        assert_eq!(cancel.reasons[0].cause, 200);
    }
}

/// Branches that never went on the wire are canceled silently.
#[tokio::test]
async fn test_cancel_skips_unstarted_branches() {
    let mut h = harness(ProxySettings::default().with_parallel(false));
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();
    assert_eq!(h.transport.requests().len(), 1);

    h.core.cancel().await.unwrap();

    // only the started branch produced wire traffic
    assert_eq!(h.transport.cancels().len(), 1);
    let untried = h.core.branch(&target("sip:b@pc-b.example.com")).unwrap();
    assert_eq!(untried.state(), BranchState::Canceled);
    assert!(!untried.started());
}

/// A branch holding its final response refuses cancellation.
#[tokio::test]
async fn test_cancel_after_branch_completed_is_invalid_state() {
    let mut h = harness(ProxySettings::default().with_parallel(false));
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    // first target fails; the hunt moves on, but its branch keeps the 486
    let (key, busy) = respond(&h.transport.requests()[0], StatusCode::BUSY_HERE);
    h.core.on_response(&key, busy).await.unwrap();

    let err = h.core.cancel().await.unwrap_err();
    assert!(err.is_invalid_state());
}

/// A 200 answering our CANCEL is bookkeeping, not a branch outcome.
#[tokio::test]
async fn test_ok_to_cancel_does_not_complete_branch() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    h.core.start().await.unwrap();
    h.core.cancel().await.unwrap();

    let cancel = h.transport.cancels()[0].clone();
    let ok_to_cancel = Response::to_request(StatusCode::OK, &cancel);
    let key = TransactionKey::for_response(&ok_to_cancel).unwrap();
    h.core.on_response(&key, ok_to_cancel).await.unwrap();

    // still waiting for the INVITE's 487
    assert_eq!(h.core.branches().len(), 1);
    assert_eq!(
        h.core
            .branch(&target("sip:a@pc-a.example.com"))
            .unwrap()
            .state(),
        BranchState::Canceled,
    );
    assert!(h.core.original_request().is_some());

    let request = h.transport.requests()[0].clone();
    let (key, terminated) = respond(&request, StatusCode::REQUEST_TERMINATED);
    h.core.on_response(&key, terminated).await.unwrap();
    assert_eq!(
        h.transport.last_upstream().unwrap().status,
        StatusCode::REQUEST_TERMINATED,
    );
}

/// Cancellation stops the branch timer for good.
#[tokio::test(start_paused = true)]
async fn test_cancel_stops_branch_timers() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    h.core.start().await.unwrap();
    h.core.cancel().await.unwrap();

    // well past the 180s deadline, nothing fires
    let waited = timeout(Duration::from_secs(400), h.events.recv()).await;
    assert!(waited.is_err());
}
