use async_trait::async_trait;
use meshcall_core::{ClientMessage, IceCandidate, Identity, RoomId};

/// Outbound half of the relay connection. Sends are fire-and-forget.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send(&self, msg: ClientMessage);

    async fn send_offer(&self, to: Identity, sdp: String) {
        self.send(ClientMessage::Offer { to, sdp }).await;
    }

    async fn send_answer(&self, to: Identity, sdp: String) {
        self.send(ClientMessage::Answer { to, sdp }).await;
    }

    async fn send_ice(&self, to: Identity, candidate: IceCandidate) {
        self.send(ClientMessage::IceCandidate { to, candidate }).await;
    }

    async fn announce_call_started(&self, room: RoomId) {
        self.send(ClientMessage::CallStarted { room }).await;
    }

    /// `to: None` tells the whole room.
    async fn announce_call_ended(&self, room: RoomId, to: Option<Identity>) {
        self.send(ClientMessage::EndCall { room, to }).await;
    }
}
