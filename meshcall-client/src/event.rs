use crate::session::SessionState;
use crate::transport::RemoteStream;
use meshcall_core::{ChatMessage, ErrorCode, Identity, Member, RoomId};

/// Everything the presentation layer is told about.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    RemoteStreamAvailable {
        identity: Identity,
        stream: RemoteStream,
    },
    RemoteStreamRemoved {
        identity: Identity,
    },
    SessionStateChanged {
        identity: Identity,
        state: SessionState,
    },
    /// An offer is waiting for `accept_call` or `decline_call`.
    IncomingCall {
        from: Identity,
        username: String,
    },
    /// A session was closed because its transport was lost.
    PeerDisconnected {
        identity: Identity,
    },
    OfferTimedOut {
        identity: Identity,
    },
    RosterChanged {
        room: RoomId,
        members: Vec<Member>,
    },
    ChatMessage(ChatMessage),
    ChatHistory(Vec<ChatMessage>),
    UserTyping {
        identity: Identity,
        username: String,
        is_typing: bool,
    },
    RelayError {
        code: ErrorCode,
        message: String,
    },
}
