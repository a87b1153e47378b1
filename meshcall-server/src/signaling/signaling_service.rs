use crate::chat::ChatStore;
use crate::config::RelayConfig;
use crate::registry::{ConnectionId, LeaveOutcome, Participant, RoomRegistry};
use dashmap::DashMap;
use meshcall_core::{
    ChatMessage, ClientMessage, ErrorCode, Identity, IceServerConfig, Member, RoomId,
    ServerMessage,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct PeerHandle {
    member: Member,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

struct SignalingInner {
    peers: DashMap<ConnectionId, PeerHandle>,
    registry: RoomRegistry,
    chat: ChatStore,
    ice_servers: Vec<IceServerConfig>,
}

/// Routes signaling between connections. `from` is always taken from the
/// connection that sent the message, never from its payload.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
                registry: RoomRegistry::new(),
                chat: ChatStore::new(config.chat_history_limit),
                ice_servers: config.ice_servers.clone(),
            }),
        }
    }

    /// Derives the member a connection speaks as from its auth token.
    pub fn identify(connection: ConnectionId, token: Option<&str>) -> Member {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Member::new(token, format!("user-{token}")),
            None => {
                let anon = format!("anon-{}", connection.short());
                Member::new(anon.clone(), anon)
            }
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.inner.registry
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.peers.len()
    }

    /// Registers the outbound channel and greets the connection.
    pub fn add_peer(
        &self,
        connection: ConnectionId,
        member: Member,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let welcome = ServerMessage::Welcome {
            identity: member.user_id.clone(),
            username: member.username.clone(),
            ice_servers: self.get_ice_servers(),
        };
        self.inner.peers.insert(connection, PeerHandle { member, tx });
        self.send_signal(connection, welcome);
    }

    /// Leaves the connection's room, then forgets the connection.
    pub fn remove_peer(&self, connection: ConnectionId) {
        if let Some(room) = self.inner.registry.room_of(connection) {
            self.leave_room(connection, &room);
        }
        self.inner.peers.remove(&connection);
    }

    pub fn send_signal(&self, connection: ConnectionId, msg: ServerMessage) {
        if let Some(peer) = self.inner.peers.get(&connection) {
            if let Err(e) = peer.tx.send(msg) {
                error!("Failed to queue message for {}: {:?}", connection, e);
            }
        } else {
            warn!("Attempted to send signal to disconnected connection {}", connection);
        }
    }

    /// Parses a text frame and dispatches it; bad input gets an `error` reply.
    pub fn handle_text(&self, connection: ConnectionId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(msg) => self.handle_message(connection, msg),
            Err(e) => {
                warn!("Invalid message from {}: {}", connection, e);
                self.send_signal(connection, ServerMessage::error(ErrorCode::Malformed, e.to_string()));
            }
        }
    }

    pub fn handle_message(&self, connection: ConnectionId, msg: ClientMessage) {
        let Some(sender) = self.member_of(connection) else {
            warn!("Message from unknown connection {}", connection);
            return;
        };
        debug!("{} from {} ({})", msg.op(), sender.user_id, connection);

        match msg {
            ClientMessage::Join { room } => self.join_room(connection, sender, room),

            ClientMessage::Leave { room } => {
                if self.inner.registry.room_of(connection).as_ref() == Some(&room) {
                    self.leave_room(connection, &room);
                } else {
                    debug!("{} asked to leave '{}' without being in it", connection, room);
                }
            }

            ClientMessage::CallStarted { room } => {
                if !self.is_in(connection, &room) {
                    warn!("call-started for '{}' from outside the room ({})", room, connection);
                    return;
                }
                let msg = ServerMessage::CallStarted {
                    from: sender.user_id,
                    username: sender.username,
                };
                self.broadcast(&room, msg, Some(connection));
            }

            ClientMessage::Offer { to, sdp } => self.forward(connection, &to, |from| {
                ServerMessage::Offer {
                    from: from.user_id,
                    username: from.username,
                    sdp,
                }
            }),

            ClientMessage::Answer { to, sdp } => self.forward(connection, &to, |from| {
                ServerMessage::Answer {
                    from: from.user_id,
                    sdp,
                }
            }),

            ClientMessage::IceCandidate { to, candidate } => {
                self.forward(connection, &to, |from| ServerMessage::IceCandidate {
                    from: from.user_id,
                    candidate,
                })
            }

            ClientMessage::EndCall { room, to } => {
                if !self.is_in(connection, &room) {
                    warn!("end-call for '{}' from outside the room ({})", room, connection);
                    return;
                }
                let build = |from: Member| ServerMessage::CallEnded {
                    user_id: from.user_id,
                    username: from.username,
                };
                match to {
                    Some(to) => self.forward(connection, &to, build),
                    None => self.broadcast(&room, build(sender), Some(connection)),
                }
            }

            ClientMessage::SendMessage { content, kind } => {
                let Some(room) = self.require_room(connection) else {
                    return;
                };
                let message = ChatMessage::new(sender, content, kind);
                self.inner.chat.append(&room, message.clone());
                self.broadcast(&room, ServerMessage::NewMessage { message }, None);
            }

            ClientMessage::GetMessages { limit } => {
                let Some(room) = self.require_room(connection) else {
                    return;
                };
                let messages = self.inner.chat.recent(&room, limit);
                self.send_signal(connection, ServerMessage::Messages { messages });
            }

            ClientMessage::Typing { is_typing } => {
                let Some(room) = self.require_room(connection) else {
                    return;
                };
                let msg = ServerMessage::UserTyping {
                    user_id: sender.user_id,
                    username: sender.username,
                    is_typing,
                };
                self.broadcast(&room, msg, Some(connection));
            }
        }
    }

    fn join_room(&self, connection: ConnectionId, member: Member, room: RoomId) {
        if let Some(current) = self.inner.registry.room_of(connection) {
            if current != room {
                info!("{} switches from '{}' to '{}'", connection, current, room);
                self.leave_room(connection, &current);
            }
        }

        let outcome = match self
            .inner
            .registry
            .join(&room, Participant::new(connection, member.clone()))
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Join failed: {}", e);
                return;
            }
        };

        self.send_signal(
            connection,
            ServerMessage::Joined {
                room: room.clone(),
                members: outcome.members.clone(),
            },
        );

        if outcome.duplicate || !outcome.first_connection {
            return;
        }

        info!("{} joined room '{}'", member.user_id, room);
        self.broadcast(&room, ServerMessage::user_joined(&member), Some(connection));
        self.broadcast(
            &room,
            ServerMessage::UsersOnline {
                room: room.clone(),
                members: outcome.members,
            },
            None,
        );
    }

    fn leave_room(&self, connection: ConnectionId, room: &RoomId) {
        match self.inner.registry.leave(room, connection) {
            LeaveOutcome::NotMember => {}
            LeaveOutcome::Left {
                member,
                last_connection,
            } => {
                if !last_connection {
                    debug!("{} still present in '{}' via another connection", member.user_id, room);
                    return;
                }
                info!("{} left room '{}'", member.user_id, room);
                self.broadcast(room, ServerMessage::user_left(&member), None);
                self.broadcast(
                    room,
                    ServerMessage::UsersOnline {
                        room: room.clone(),
                        members: self.inner.registry.members_of(room),
                    },
                    None,
                );
            }
        }
    }

    /// Delivers to the signaling connection of `to` in the sender's room.
    /// Later connections of the same identity get room broadcasts only.
    fn forward(
        &self,
        connection: ConnectionId,
        to: &Identity,
        build: impl FnOnce(Member) -> ServerMessage,
    ) {
        let Some(sender) = self.member_of(connection) else {
            return;
        };
        let Some(room) = self.inner.registry.room_of(connection) else {
            warn!("Dropping directed message from {}: not in a room", sender.user_id);
            return;
        };

        let Some(target) = self.inner.registry.signaling_connection(&room, to) else {
            warn!("Dropping directed message for {}: not present in '{}'", to, room);
            return;
        };

        self.send_signal(target, build(sender));
    }

    fn broadcast(&self, room: &RoomId, msg: ServerMessage, except: Option<ConnectionId>) {
        for target in self.inner.registry.room_connections(room) {
            if Some(target) != except {
                self.send_signal(target, msg.clone());
            }
        }
    }

    fn require_room(&self, connection: ConnectionId) -> Option<RoomId> {
        let room = self.inner.registry.room_of(connection);
        if room.is_none() {
            self.send_signal(
                connection,
                ServerMessage::error(ErrorCode::NotInRoom, "join a room first"),
            );
        }
        room
    }

    fn is_in(&self, connection: ConnectionId, room: &RoomId) -> bool {
        self.inner.registry.room_of(connection).as_ref() == Some(room)
    }

    fn member_of(&self, connection: ConnectionId) -> Option<Member> {
        self.inner
            .peers
            .get(&connection)
            .map(|peer| peer.member.clone())
    }
}
