use super::init_tracing;
use crate::utils::*;
use meshcall_client::transport::{ConnectivityState, RemoteTrackInfo, TransportEvent};
use meshcall_client::{CallEvent, MediaConstraints, SessionState, SignalOutcome, TrackKind};
use meshcall_core::IceCandidate;

/// Brings a session with `remote` to connected on the initiator side.
async fn connect_to(harness: &mut ManagerHarness, remote: &str) {
    let room = harness.room();
    harness.manager.start_call(&room, &[id(remote)]).await.unwrap();
    harness
        .manager
        .handle_answer(&id(remote), format!("v=0 answer from {remote}"))
        .await
        .unwrap();
    let transport = harness.factory.latest_for(remote).unwrap();
    transport.set_connectivity(ConnectivityState::Connected);
    transport.emit(TransportEvent::RemoteTrack(
        transport.session,
        RemoteTrackInfo {
            stream_id: format!("stream-of-{remote}"),
            track_id: format!("audio-of-{remote}"),
            kind: TrackKind::Audio,
        },
    ));
    harness.pump_transport().await;
    assert_eq!(
        harness.manager.session(&id(remote)).unwrap().state(),
        SessionState::Connected
    );
}

#[tokio::test]
async fn test_end_call_releases_every_resource() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    connect_to(&mut alice, "bob").await;
    connect_to(&mut alice, "carol").await;
    assert_eq!(alice.media.attached_count(), 2);
    alice.drain_events();

    alice.manager.end_call().await;

    assert!(alice.manager.snapshots().is_empty());
    assert!(alice.factory.created().iter().all(|t| t.is_closed()));
    assert!(alice.factory.created().iter().all(|t| t.attached_stream().is_none()));
    assert_eq!(alice.media.attached_count(), 0);
    assert!(!alice.media.is_active());
    assert_eq!(alice.manager.monitor().active_timers(), 0);
    assert!(alice.signaling.end_calls().contains(&None));

    let events = alice.drain_events();
    for remote in ["bob", "carol"] {
        assert!(events.contains(&CallEvent::SessionStateChanged {
            identity: id(remote),
            state: SessionState::Closed
        }));
        assert!(events.contains(&CallEvent::RemoteStreamRemoved { identity: id(remote) }));
    }
}

#[tokio::test]
async fn test_user_left_closes_session_in_any_state() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    let bob = id("bob");
    let room = alice.room();

    alice.manager.start_call(&room, &[bob.clone()]).await.unwrap();
    assert!(alice.manager.handle_user_left(&bob).await);

    let transport = alice.factory.latest_for("bob").unwrap();
    assert!(transport.is_closed());
    assert!(alice.manager.session(&bob).is_none());
    assert_eq!(alice.media.attached_count(), 0);
    assert_eq!(alice.manager.monitor().active_timers(), 0);

    let outcome = alice
        .manager
        .handle_answer(&bob, "v=0 late answer".into())
        .await
        .unwrap();
    assert_eq!(outcome, SignalOutcome::StaleMessage);
    assert!(!alice.manager.handle_user_left(&bob).await);
}

#[tokio::test]
async fn test_call_ended_by_peer_removes_its_stream() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    connect_to(&mut alice, "bob").await;

    let events = alice.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        CallEvent::RemoteStreamAvailable { identity, stream } if identity.as_str() == "bob" && stream.tracks.len() == 1
    )));

    assert!(alice.manager.handle_call_ended(&id("bob")).await);
    let events = alice.drain_events();
    assert!(events.contains(&CallEvent::RemoteStreamRemoved { identity: id("bob") }));
    // the local stream outlives a single peer leaving
    assert!(alice.media.is_active());
}

#[tokio::test]
async fn test_events_from_retired_sessions_are_ignored() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    connect_to(&mut alice, "bob").await;
    let old = alice.factory.latest_for("bob").unwrap();

    alice.manager.end_session(&id("bob")).await;
    alice.drain_events();

    old.set_connectivity(ConnectivityState::Failed);
    alice.pump_transport().await;

    assert!(alice.drain_events().is_empty());
    assert!(alice.manager.snapshots().is_empty());
}

#[tokio::test]
async fn test_end_session_targets_one_peer() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    connect_to(&mut alice, "bob").await;
    connect_to(&mut alice, "carol").await;

    assert!(alice.manager.end_session(&id("bob")).await);

    assert_eq!(alice.signaling.end_calls(), vec![Some(id("bob"))]);
    assert!(alice.manager.session(&id("bob")).is_none());
    assert_eq!(
        alice.manager.session(&id("carol")).unwrap().state(),
        SessionState::Connected
    );
    assert_eq!(alice.media.attached_count(), 1);
    assert!(!alice.manager.end_session(&id("bob")).await);
}

#[tokio::test]
async fn test_late_candidate_after_end_call_is_stale() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    let bob = id("bob");
    connect_to(&mut alice, "bob").await;

    alice.manager.end_call().await;

    let outcome = alice
        .manager
        .handle_ice_candidate(&bob, IceCandidate::new("candidate:old-ufrag"))
        .await;
    assert_eq!(outcome, SignalOutcome::StaleMessage);
    assert!(alice.manager.snapshots().is_empty());

    // a fresh offer from the same peer starts clean
    alice.media.acquire(&MediaConstraints::default()).await.unwrap();
    let outcome = alice
        .manager
        .handle_offer(&bob, "user-bob", "v=0 second call".into())
        .await
        .unwrap();
    assert_eq!(outcome, SignalOutcome::Applied);
    let transport = alice.factory.latest_for("bob").unwrap();
    assert!(transport.applied_candidates().is_empty());

    let outcome = alice
        .manager
        .handle_ice_candidate(&bob, IceCandidate::new("candidate:new-ufrag"))
        .await;
    assert_eq!(outcome, SignalOutcome::Applied);
    assert_eq!(transport.applied_candidates(), vec!["candidate:new-ufrag"]);
}

#[tokio::test]
async fn test_candidate_after_end_session_until_we_call_again() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    let bob = id("bob");
    connect_to(&mut alice, "bob").await;

    alice.manager.end_session(&bob).await;
    let outcome = alice
        .manager
        .handle_ice_candidate(&bob, IceCandidate::new("candidate:late"))
        .await;
    assert_eq!(outcome, SignalOutcome::StaleMessage);
    assert!(alice.manager.session(&bob).is_none());

    let room = alice.room();
    assert_eq!(alice.manager.start_call(&room, &[bob.clone()]).await.unwrap(), 1);
    let outcome = alice
        .manager
        .handle_ice_candidate(&bob, IceCandidate::new("candidate:next"))
        .await;
    assert_eq!(outcome, SignalOutcome::Queued);
}

#[tokio::test]
async fn test_user_left_forgets_closed_session() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    let bob = id("bob");
    connect_to(&mut alice, "bob").await;

    alice.manager.handle_call_ended(&bob).await;
    assert_eq!(
        alice
            .manager
            .handle_ice_candidate(&bob, IceCandidate::new("candidate:late"))
            .await,
        SignalOutcome::StaleMessage
    );

    assert!(!alice.manager.handle_user_left(&bob).await);
    // bob rejoined and trickles ahead of his offer
    assert_eq!(
        alice
            .manager
            .handle_ice_candidate(&bob, IceCandidate::new("candidate:rejoined"))
            .await,
        SignalOutcome::Queued
    );
}
