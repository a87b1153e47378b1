use super::init_tracing;
use crate::utils::*;
use meshcall_client::transport::ConnectivityState;
use meshcall_client::{CallError, MediaConstraints, SessionState, TrackKind};

#[tokio::test]
async fn test_mute_is_local_only() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    let room = alice.room();
    alice.manager.start_call(&room, &[id("bob")]).await.unwrap();
    alice
        .manager
        .handle_answer(&id("bob"), "v=0 answer".into())
        .await
        .unwrap();
    let transport = alice.factory.latest_for("bob").unwrap();
    transport.set_connectivity(ConnectivityState::Connected);
    alice.pump_transport().await;

    alice.signaling.clear();
    let ops_before = transport.ops();

    assert!(!alice.media.toggle_video());
    assert!(!alice.media.toggle_audio());

    let state = alice.media.state();
    assert!(state.capture_active);
    assert!(!state.video_enabled);
    assert!(!state.audio_enabled);

    let stream = alice.media.stream().unwrap();
    assert!(stream.tracks_of(TrackKind::Video).all(|t| !t.is_enabled()));
    assert!(stream.tracks().iter().all(|t| !t.is_stopped()));

    assert_eq!(alice.signaling.count(), 0);
    assert_eq!(transport.ops(), ops_before);
    assert_eq!(
        alice.manager.session(&id("bob")).unwrap().state(),
        SessionState::Connected
    );

    assert!(alice.media.toggle_video());
    assert_eq!(alice.signaling.count(), 0);
}

#[tokio::test]
async fn test_start_call_requires_local_stream() {
    init_tracing();
    let mut alice = ManagerHarness::new("alice", test_config());
    let room = alice.room();

    let err = alice.manager.start_call(&room, &[id("bob")]).await.unwrap_err();
    assert!(matches!(err, CallError::NoLocalStream));
    assert!(alice.factory.created().is_empty());
    assert_eq!(alice.signaling.count(), 0);
}

#[tokio::test]
async fn test_one_stream_is_shared_by_all_sessions() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    let room = alice.room();

    let offered = alice
        .manager
        .start_call(&room, &[id("bob"), id("carol"), id("alice")])
        .await
        .unwrap();
    assert_eq!(offered, 2);

    let stream_id = alice.media.stream().unwrap().id().to_owned();
    for transport in alice.factory.created() {
        assert_eq!(transport.attached_stream(), Some(stream_id.clone()));
    }
    assert_eq!(alice.media.attached_count(), 2);

    // acquiring again hands back the same stream
    let again = alice.media.acquire(&MediaConstraints::default()).await.unwrap();
    assert_eq!(again.id(), stream_id);
}

#[tokio::test]
async fn test_peer_failure_is_scoped_to_that_peer() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    alice.factory.fail_for("carol");
    let room = alice.room();

    let offered = alice
        .manager
        .start_call(&room, &[id("bob"), id("carol")])
        .await
        .unwrap();

    assert_eq!(offered, 1);
    assert!(alice.manager.session(&id("bob")).is_some());
    assert!(alice.manager.session(&id("carol")).is_none());
    assert_eq!(alice.signaling.offers_to(&id("bob")).len(), 1);
    assert!(alice.signaling.offers_to(&id("carol")).is_empty());
}

#[tokio::test]
async fn test_second_start_call_only_offers_to_new_members() {
    init_tracing();
    let mut alice = ManagerHarness::with_media("alice").await;
    let room = alice.room();

    alice.manager.start_call(&room, &[id("bob")]).await.unwrap();
    let offered = alice
        .manager
        .start_call(&room, &[id("bob"), id("carol")])
        .await
        .unwrap();

    assert_eq!(offered, 1);
    assert_eq!(alice.signaling.offers_to(&id("bob")).len(), 1);
    assert_eq!(alice.factory.created().len(), 2);
}
