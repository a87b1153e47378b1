use meshcall_core::{ClientMessage, Member, ServerMessage};
use meshcall_server::{ConnectionId, SignalingService};
use tokio::sync::mpsc;

/// A relay connection without a socket: messages go straight into the
/// service and replies are read from the outbound channel.
pub struct TestConnection {
    pub id: ConnectionId,
    pub member: Member,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl TestConnection {
    pub fn connect(service: &SignalingService, token: Option<&str>) -> Self {
        let id = ConnectionId::new();
        let member = SignalingService::identify(id, token);
        let (tx, rx) = mpsc::unbounded_channel();
        service.add_peer(id, member.clone(), tx);
        Self { id, member, rx }
    }

    /// Connects and discards the welcome.
    pub fn connect_quiet(service: &SignalingService, token: &str) -> Self {
        let mut conn = Self::connect(service, Some(token));
        conn.drain();
        conn
    }

    pub fn send(&self, service: &SignalingService, msg: ClientMessage) {
        service.handle_message(self.id, msg);
    }

    pub fn send_text(&self, service: &SignalingService, text: &str) {
        service.handle_text(self.id, text);
    }

    /// Everything delivered so far, in order.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }

    pub fn join(&mut self, service: &SignalingService, room: &str) -> Vec<ServerMessage> {
        self.send(service, ClientMessage::Join { room: room.into() });
        self.drain()
    }
}

pub fn ops(messages: &[ServerMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| {
            serde_json::to_value(m)
                .ok()
                .and_then(|v| v["op"].as_str().map(str::to_owned))
                .unwrap_or_default()
        })
        .collect()
}
