use meshcall_core::{ClientMessage, ErrorCode, ServerMessage};

use crate::integration::init_tracing;
use crate::utils::{TestRelay, WsTestClient};

#[tokio::test]
async fn test_offer_over_websocket() {
    init_tracing();
    let relay = TestRelay::start().await.expect("Failed to start relay");

    let mut alice = WsTestClient::connect(&relay.url("alice"))
        .await
        .expect("Failed to connect alice");
    let mut bob = WsTestClient::connect(&relay.url("bob"))
        .await
        .expect("Failed to connect bob");

    let welcome = alice.recv().await.expect("welcome");
    assert!(matches!(welcome, ServerMessage::Welcome { identity, .. } if identity.as_str() == "alice"));

    alice
        .send(&ClientMessage::Join { room: "r1".into() })
        .await
        .unwrap();
    alice
        .recv_until(|m| matches!(m, ServerMessage::Joined { .. }))
        .await
        .unwrap();

    bob.send(&ClientMessage::Join { room: "r1".into() })
        .await
        .unwrap();
    bob.recv_until(|m| matches!(m, ServerMessage::Joined { .. }))
        .await
        .unwrap();

    alice
        .recv_until(|m| matches!(m, ServerMessage::UserJoined { user_id, .. } if user_id.as_str() == "bob"))
        .await
        .expect("alice sees bob join");

    alice
        .send(&ClientMessage::Offer {
            to: "bob".into(),
            sdp: "v=0 offer".into(),
        })
        .await
        .unwrap();

    let offer = bob
        .recv_until(|m| matches!(m, ServerMessage::Offer { .. }))
        .await
        .expect("bob receives the offer");
    assert_eq!(
        offer,
        ServerMessage::Offer {
            from: "alice".into(),
            username: "user-alice".into(),
            sdp: "v=0 offer".into(),
        }
    );

    bob.close().await.unwrap();
    alice
        .recv_until(|m| matches!(m, ServerMessage::UserLeft { user_id, .. } if user_id.as_str() == "bob"))
        .await
        .expect("alice sees bob leave");
}

#[tokio::test]
async fn test_garbage_frame_gets_error() {
    init_tracing();
    let relay = TestRelay::start().await.expect("Failed to start relay");
    let mut client = WsTestClient::connect(&relay.url("x")).await.unwrap();
    client.recv().await.unwrap();

    client.send_raw("{\"op\":\"dance\"}").await.unwrap();

    let reply = client.recv().await.unwrap();
    assert!(matches!(
        reply,
        ServerMessage::Error {
            code: ErrorCode::Malformed,
            ..
        }
    ));
}
