use super::init_tracing;
use crate::utils::*;
use meshcall_client::transport::SdpKind;
use meshcall_client::{CallError, CallEvent, IncomingCallPolicy, MediaConstraints, SignalOutcome};
use meshcall_core::IceCandidate;

#[tokio::test]
async fn test_offer_without_media_is_held_until_accepted() {
    init_tracing();
    let mut bob = ManagerHarness::new("bob", test_config());
    let alice = id("alice");

    let outcome = bob
        .manager
        .handle_offer(&alice, "user-alice", "v=0 offer".into())
        .await
        .unwrap();
    assert_eq!(outcome, SignalOutcome::Deferred);
    assert!(bob.manager.has_incoming_call(&alice));

    let outcome = bob
        .manager
        .handle_ice_candidate(&alice, IceCandidate::new("candidate:0"))
        .await;
    assert_eq!(outcome, SignalOutcome::Queued);

    // a renegotiated offer replaces the held one without a second prompt
    let outcome = bob
        .manager
        .handle_offer(&alice, "user-alice", "v=0 offer again".into())
        .await
        .unwrap();
    assert_eq!(outcome, SignalOutcome::Deferred);

    let incoming: Vec<_> = bob
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, CallEvent::IncomingCall { .. }))
        .collect();
    assert_eq!(
        incoming,
        vec![CallEvent::IncomingCall {
            from: alice.clone(),
            username: "user-alice".into()
        }]
    );
    assert!(bob.factory.created().is_empty());
    assert!(bob.signaling.sent().is_empty());

    let err = bob.manager.accept_call(&alice).await.unwrap_err();
    assert!(matches!(err, CallError::NoLocalStream));

    bob.media.acquire(&MediaConstraints::default()).await.unwrap();
    bob.manager.accept_call(&alice).await.unwrap();

    let transport = bob.factory.latest_for("alice").unwrap();
    assert!(
        transport
            .ops()
            .contains(&TransportOp::SetRemote(SdpKind::Offer, "v=0 offer again".into()))
    );
    assert_eq!(transport.applied_candidates(), vec!["candidate:0"]);
    assert_eq!(bob.signaling.answers_to(&alice).len(), 1);
    assert!(!bob.manager.has_incoming_call(&alice));
}

#[tokio::test]
async fn test_decline_policy_rejects_immediately() {
    init_tracing();
    let mut config = test_config();
    config.incoming_call_policy = IncomingCallPolicy::Decline;
    let mut bob = ManagerHarness::new("bob", config);
    let alice = id("alice");

    let outcome = bob
        .manager
        .handle_offer(&alice, "user-alice", "v=0 offer".into())
        .await
        .unwrap();
    assert_eq!(outcome, SignalOutcome::Declined);
    assert_eq!(bob.signaling.end_calls(), vec![Some(alice.clone())]);

    // trickle that was already in flight
    let outcome = bob
        .manager
        .handle_ice_candidate(&alice, IceCandidate::new("candidate:late"))
        .await;
    assert_eq!(outcome, SignalOutcome::StaleMessage);
    assert!(bob.manager.snapshots().is_empty());
}

#[tokio::test]
async fn test_decline_call_drops_held_offer() {
    init_tracing();
    let mut bob = ManagerHarness::new("bob", test_config());
    let alice = id("alice");

    bob.manager
        .handle_offer(&alice, "user-alice", "v=0 offer".into())
        .await
        .unwrap();
    bob.manager.decline_call(&alice).await.unwrap();

    assert!(bob.manager.snapshots().is_empty());
    assert_eq!(bob.signaling.end_calls(), vec![Some(alice.clone())]);
    assert_eq!(
        bob.manager
            .handle_ice_candidate(&alice, IceCandidate::new("candidate:late"))
            .await,
        SignalOutcome::StaleMessage
    );

    let err = bob.manager.decline_call(&alice).await.unwrap_err();
    assert!(matches!(err, CallError::NoIncomingCall(from) if from == alice));
}

#[tokio::test]
async fn test_start_call_answers_held_offers() {
    init_tracing();
    let mut bob = ManagerHarness::new("bob", test_config());
    let alice = id("alice");
    let carol = id("carol");
    let room = bob.room();

    bob.manager
        .handle_offer(&alice, "user-alice", "v=0 offer".into())
        .await
        .unwrap();
    bob.media.acquire(&MediaConstraints::default()).await.unwrap();

    let offered = bob
        .manager
        .start_call(&room, &[alice.clone(), carol.clone()])
        .await
        .unwrap();
    assert_eq!(offered, 1);
    assert_eq!(bob.signaling.answers_to(&alice).len(), 1);
    assert!(bob.signaling.offers_to(&alice).is_empty());
    assert_eq!(bob.signaling.offers_to(&carol).len(), 1);
    assert_eq!(bob.manager.active_session_count(), 2);
}
