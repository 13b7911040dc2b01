//! Parallel forking scenarios
//!
//! End-to-end flows through [`ProxyCore`] with all branches racing: winner
//! selection, loser cancellation, redirect recursion, branch timeouts and
//! post-completion retransmission handling.

mod common;

use common::{harness, redirect, respond, target, Sent};

use tokio::time::{Duration, Instant};

use sipfork_proxy_core::{BranchState, ProxyEvent, ProxySettings};
use sipfork_sip_types::{Method, StatusCode, MAGIC_COOKIE};

/// Forking an INVITE sends one 100 upstream and one request per target.
#[tokio::test]
async fn test_fork_sends_trying_once_and_all_branches() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
            target("sip:c@pc-c.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    // the 100 goes out first, bound to the upstream server transaction
    match &h.transport.sent()[0] {
        Sent::Response(key, response) => {
            assert!(key.is_server());
            assert_eq!(key.branch(), "z9hG4bKclient1");
            assert_eq!(response.status, StatusCode::TRYING);
            assert_eq!(response.via_branch(), Some("z9hG4bKclient1"));
        }
        other => panic!("expected upstream 100 first, got {:?}", other),
    }

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].uri, target("sip:a@pc-a.example.com"));
    assert_eq!(requests[1].uri, target("sip:b@pc-b.example.com"));
    assert_eq!(requests[2].uri, target("sip:c@pc-c.example.com"));
    for request in &requests {
        assert_eq!(request.method, Method::Invite);
        assert_eq!(request.max_forwards, Some(69));
        let branch = request.via_branch().unwrap();
        assert!(branch.starts_with(MAGIC_COOKIE));
        // the upstream via rides below ours
        assert_eq!(request.via.len(), 2);
        assert_eq!(request.via[1].branch.as_deref(), Some("z9hG4bKclient1"));
    }

    // all three vias are distinct
    let mut branches: Vec<_> = requests
        .iter()
        .map(|r| r.via_branch().unwrap().to_string())
        .collect();
    branches.sort();
    branches.dedup();
    assert_eq!(branches.len(), 3);

    // starting again repeats neither the 100 nor the requests
    h.core.start().await.unwrap();
    assert_eq!(h.transport.upstream_statuses(), vec![StatusCode::TRYING]);
    assert_eq!(h.transport.requests().len(), 3);
}

/// Among failures the first arrival wins, even over lower-numbered ones.
#[tokio::test]
async fn test_first_failure_wins_among_failures() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
            target("sip:c@pc-c.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let requests = h.transport.requests();
    for (index, status) in [
        StatusCode::BUSY_HERE,
        StatusCode::NOT_FOUND,
        StatusCode::SERVICE_UNAVAILABLE,
    ]
    .into_iter()
    .enumerate()
    {
        let (key, response) = respond(&requests[index], status);
        h.core.on_response(&key, response).await.unwrap();
    }

    let final_response = h.transport.last_upstream().unwrap();
    assert_eq!(final_response.status, StatusCode::BUSY_HERE);
    // our via is gone; the client's is on top
    assert_eq!(final_response.via.len(), 1);
    assert_eq!(final_response.via_branch(), Some("z9hG4bKclient1"));

    assert!(h.core.branches().is_empty());
    assert_eq!(h.core.final_branch(), Some(&target("sip:a@pc-a.example.com")));
    assert!(h.core.original_request().is_none());
}

/// A 200 cancels every other branch and goes upstream once they are done.
#[tokio::test]
async fn test_success_cancels_losing_branches() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let requests = h.transport.requests();
    let (key, ok) = respond(&requests[1], StatusCode::OK);
    h.core.on_response(&key, ok).await.unwrap();

    // the loser got a CANCEL on its own branch transaction
    let cancels = h.transport.cancels();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].method, Method::Cancel);
    assert_eq!(cancels[0].cseq.method, Method::Cancel);
    assert_eq!(cancels[0].uri, requests[0].uri);
    assert_eq!(cancels[0].via_branch(), requests[0].via_branch());

    // a canceled branch counts as arrived, so the 200 went straight up
    let final_response = h.transport.last_upstream().unwrap();
    assert_eq!(final_response.status, StatusCode::OK);
    assert_eq!(h.core.final_branch(), Some(&target("sip:b@pc-b.example.com")));
}

/// A 6xx ends the hunt the same way a 2xx does.
#[tokio::test]
async fn test_six_hundred_class_cancels_and_wins() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let requests = h.transport.requests();
    let (key, decline) = respond(&requests[0], StatusCode::DECLINE);
    h.core.on_response(&key, decline).await.unwrap();

    assert_eq!(h.transport.cancels().len(), 1);
    assert_eq!(
        h.transport.last_upstream().unwrap().status,
        StatusCode::DECLINE,
    );
}

/// One failure, one 200, one silent target: the 200 wins and nothing is
/// re-queried.
#[tokio::test]
async fn test_mixed_outcomes_settle_on_the_success() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
            target("sip:c@pc-c.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let requests = h.transport.requests();
    let (key, unavailable) = respond(&requests[0], StatusCode::SERVICE_UNAVAILABLE);
    h.core.on_response(&key, unavailable).await.unwrap();

    let (key, ok) = respond(&requests[1], StatusCode::OK);
    h.core.on_response(&key, ok).await.unwrap();

    // only the still-open branch got a CANCEL; the responded one was skipped
    let cancels = h.transport.cancels();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].via_branch(), requests[2].via_branch());

    assert_eq!(h.transport.last_upstream().unwrap().status, StatusCode::OK);
    assert_eq!(h.core.final_branch(), Some(&target("sip:b@pc-b.example.com")));
    // no branch was re-queried
    assert_eq!(h.transport.requests().len(), 3);
}

/// When every branch succeeds, the numerically lowest 2xx goes upstream.
#[tokio::test]
async fn test_lowest_success_wins_among_successes() {
    let mut h = harness(ProxySettings::default().with_no_cancel(true));
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let requests = h.transport.requests();
    let (key, accepted) = respond(&requests[0], StatusCode(202));
    h.core.on_response(&key, accepted).await.unwrap();

    let (key, ok) = respond(&requests[1], StatusCode::OK);
    h.core.on_response(&key, ok).await.unwrap();

    assert_eq!(h.transport.last_upstream().unwrap().status, StatusCode::OK);
    assert_eq!(h.core.final_branch(), Some(&target("sip:b@pc-b.example.com")));
}

/// The no-cancel flag leaves losers running after a winner.
#[tokio::test]
async fn test_no_cancel_leaves_losers_running() {
    let mut h = harness(ProxySettings::default().with_no_cancel(true));
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let requests = h.transport.requests();
    let (key, ok) = respond(&requests[1], StatusCode::OK);
    h.core.on_response(&key, ok).await.unwrap();

    assert!(h.transport.cancels().is_empty());
    // branch a is still waiting, so no final yet
    assert_eq!(h.transport.upstream_statuses(), vec![StatusCode::TRYING]);

    let (key, busy) = respond(&requests[0], StatusCode::BUSY_HERE);
    h.core.on_response(&key, busy).await.unwrap();
    assert_eq!(h.transport.last_upstream().unwrap().status, StatusCode::OK);
}

/// 180s are forwarded upstream; downstream 100s stop at this hop.
#[tokio::test]
async fn test_provisionals_forwarded_except_trying() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    h.core.start().await.unwrap();

    let request = &h.transport.requests()[0];
    let (key, trying) = respond(request, StatusCode::TRYING);
    h.core.on_response(&key, trying).await.unwrap();
    assert_eq!(h.transport.upstream_statuses(), vec![StatusCode::TRYING]);

    let (key, ringing) = respond(request, StatusCode::RINGING);
    h.core.on_response(&key, ringing).await.unwrap();
    let statuses = h.transport.upstream_statuses();
    assert_eq!(statuses, vec![StatusCode::TRYING, StatusCode::RINGING]);
    // the forwarded 180 lost our via on the way up
    assert_eq!(h.transport.last_upstream().unwrap().via.len(), 1);

    let (key, ok) = respond(request, StatusCode::OK);
    h.core.on_response(&key, ok).await.unwrap();
    assert_eq!(h.transport.last_upstream().unwrap().status, StatusCode::OK);
}

/// A silent branch times out and the client gets a synthesized 408.
#[tokio::test(start_paused = true)]
async fn test_branch_timeout_synthesizes_408() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    let started_at = Instant::now();
    h.core.start().await.unwrap();

    let event = h.events.recv().await.unwrap();
    assert_eq!(started_at.elapsed(), Duration::from_secs(180));
    h.core.on_event(event).await.unwrap();

    let final_response = h.transport.last_upstream().unwrap();
    assert_eq!(final_response.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(final_response.via_branch(), Some("z9hG4bKclient1"));
    assert_eq!(h.core.final_branch(), Some(&target("sip:a@pc-a.example.com")));
}

/// Shortening the proxy timeout mid-flight rearms the timer of every live
/// branch at the new value.
#[tokio::test(start_paused = true)]
async fn test_shortened_timeout_rearms_live_branches() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    let started_at = Instant::now();
    h.core.start().await.unwrap();

    // branch is running under the 180s default; tighten it to 10s
    h.core.set_proxy_timeout(Duration::from_secs(10)).unwrap();

    let event = h.events.recv().await.unwrap();
    assert_eq!(started_at.elapsed(), Duration::from_secs(10));
    h.core.on_event(event).await.unwrap();

    assert_eq!(
        h.transport.last_upstream().unwrap().status,
        StatusCode::REQUEST_TIMEOUT,
    );
    assert!(h.core.branches().is_empty());
}

/// A branch that answered before its deadline never times out.
#[tokio::test(start_paused = true)]
async fn test_timed_out_branch_does_not_beat_late_answer() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let ProxyEvent::BranchTimedOut { target: timed_out } = h.events.recv().await.unwrap();
    h.core
        .on_event(ProxyEvent::BranchTimedOut {
            target: timed_out.clone(),
        })
        .await
        .unwrap();
    // one branch down, no final yet
    assert_eq!(h.transport.upstream_statuses(), vec![StatusCode::TRYING]);

    let requests = h.transport.requests();
    let other = requests.iter().find(|r| r.uri != timed_out).unwrap();
    let (key, busy) = respond(other, StatusCode::SERVICE_UNAVAILABLE);
    h.core.on_response(&key, busy).await.unwrap();

    // the real answer displaces the empty timed-out candidate
    let final_response = h.transport.last_upstream().unwrap();
    assert_eq!(final_response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(h.core.final_branch(), Some(&other.uri));
}

/// A provisional stretches the branch deadline to the full proxy timeout.
#[tokio::test(start_paused = true)]
async fn test_provisional_extends_1xx_deadline() {
    let settings = ProxySettings::default()
        .with_timeout_1xx(Duration::from_secs(5))
        .with_proxy_timeout(Duration::from_secs(60));
    let mut h = harness(settings);
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    let started_at = Instant::now();
    h.core.start().await.unwrap();

    let request = h.transport.requests()[0].clone();
    let (key, ringing) = respond(&request, StatusCode::RINGING);
    h.core.on_response(&key, ringing).await.unwrap();

    let event = h.events.recv().await.unwrap();
    // the 5s ringing deadline was replaced by the 60s one
    assert_eq!(started_at.elapsed(), Duration::from_secs(60));
    h.core.on_event(event).await.unwrap();
    assert_eq!(
        h.transport.last_upstream().unwrap().status,
        StatusCode::REQUEST_TIMEOUT,
    );
}

/// Responses arriving after the final went upstream are forwarded
/// statelessly.
#[tokio::test]
async fn test_late_retransmission_forwarded_statelessly() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    h.core.start().await.unwrap();

    let request = h.transport.requests()[0].clone();
    let (key, ok) = respond(&request, StatusCode::OK);
    h.core.on_response(&key, ok.clone()).await.unwrap();
    assert_eq!(h.transport.last_upstream().unwrap().status, StatusCode::OK);

    // the endpoint retransmits its 200
    h.core.on_response(&key, ok).await.unwrap();
    match h.transport.sent().last().unwrap() {
        Sent::Stateless(response) => {
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.via_branch(), Some("z9hG4bKclient1"));
        }
        other => panic!("expected stateless forward, got {:?}", other),
    }
    // still exactly one transaction-bound final
    let finals = h
        .transport
        .sent()
        .iter()
        .filter(|item| {
            matches!(item, Sent::Response(_, response) if response.status == StatusCode::OK)
        })
        .count();
    assert_eq!(finals, 1);
}

/// A 302 forks onto its contacts and the winning child takes the call.
#[tokio::test]
async fn test_redirect_recursion_forks_to_contacts() {
    let mut h = harness(ProxySettings::default());
    h.core
        .add_targets(vec![target("sip:bob@pc-bob.example.com")])
        .unwrap();
    h.core.start().await.unwrap();

    let parent_request = h.transport.requests()[0].clone();
    let (key, moved) = redirect(
        &parent_request,
        &[
            target("sip:bob@mobile.example.com"),
            target("sip:bob@desk.example.com"),
        ],
    );
    h.core.on_response(&key, moved).await.unwrap();

    // two child branches were created and started immediately
    let requests = h.transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].uri, target("sip:bob@mobile.example.com"));
    assert_eq!(requests[2].uri, target("sip:bob@desk.example.com"));
    assert_eq!(h.core.branches().len(), 3);

    let parent = h.core.branch(&target("sip:bob@pc-bob.example.com")).unwrap();
    assert_eq!(parent.state(), BranchState::Responded);
    assert_eq!(
        parent.recursed_targets(),
        &[
            target("sip:bob@mobile.example.com"),
            target("sip:bob@desk.example.com"),
        ],
    );

    // first child answers; the other child gets canceled and the 200 wins
    let (key, ok) = respond(&requests[1], StatusCode::OK);
    h.core.on_response(&key, ok).await.unwrap();

    let cancels = h.transport.cancels();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0].via_branch(), requests[2].via_branch());

    assert_eq!(h.transport.last_upstream().unwrap().status, StatusCode::OK);
    assert_eq!(
        h.core.final_branch(),
        Some(&target("sip:bob@mobile.example.com")),
    );
}

/// With recursion disabled the redirect itself goes upstream.
#[tokio::test]
async fn test_redirect_goes_upstream_when_recursion_disabled() {
    let mut h = harness(ProxySettings::default().with_recurse(false));
    h.core
        .add_targets(vec![target("sip:bob@pc-bob.example.com")])
        .unwrap();
    h.core.start().await.unwrap();

    let request = h.transport.requests()[0].clone();
    let (key, moved) = redirect(&request, &[target("sip:bob@mobile.example.com")]);
    h.core.on_response(&key, moved).await.unwrap();

    assert_eq!(h.transport.requests().len(), 1);
    let final_response = h.transport.last_upstream().unwrap();
    assert_eq!(final_response.status, StatusCode::MOVED_TEMPORARILY);
    // the contact list travels with it for the client to act on
    assert_eq!(final_response.contacts.len(), 1);
    assert_eq!(
        final_response.contacts[0].uri,
        target("sip:bob@mobile.example.com"),
    );
}

/// Record-route and path URIs land in the outbound request when enabled.
#[tokio::test]
async fn test_record_route_and_path_insertion() {
    let mut h = harness(ProxySettings::default());
    h.core.set_record_route(true).unwrap();
    h.core.set_add_to_path(true).unwrap();
    h.core
        .add_targets(vec![target("sip:a@pc-a.example.com")])
        .unwrap();
    h.core.start().await.unwrap();

    let request = &h.transport.requests()[0];
    assert_eq!(request.record_routes.len(), 1);
    let route = &request.record_routes[0];
    assert_eq!(route.host, "proxy.example.com");
    assert!(route.param("lr").is_some());
    assert_eq!(route.param("transport"), Some(Some("udp")));
    assert_eq!(request.paths.len(), 1);
    assert_eq!(request.paths[0].host, "proxy.example.com");
}

/// An unsupervised proxy relays the first final response untouched.
#[tokio::test]
async fn test_unsupervised_relays_first_final() {
    let mut h = harness(ProxySettings::default().with_supervised(false));
    h.core
        .add_targets(vec![
            target("sip:a@pc-a.example.com"),
            target("sip:b@pc-b.example.com"),
        ])
        .unwrap();
    h.core.start().await.unwrap();

    let requests = h.transport.requests();
    let (key, busy) = respond(&requests[0], StatusCode::BUSY_HERE);
    h.core.on_response(&key, busy).await.unwrap();

    // no aggregation: the first final goes straight up, no cancels either
    assert!(h.transport.cancels().is_empty());
    assert_eq!(
        h.transport.last_upstream().unwrap().status,
        StatusCode::BUSY_HERE,
    );
    assert!(h.core.branches().is_empty());
}
