use crate::error::ProtocolError;
use crate::model::chat::ChatMessage;
use crate::model::identity::{Identity, Member};
use crate::model::room::RoomId;
use crate::utils::{DEFAULT_CHAT_KIND, DEFAULT_HISTORY_LIMIT, MAX_CHAT_CONTENT_BYTES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Trickle ICE candidate. Opaque to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

fn default_chat_kind() -> String {
    DEFAULT_CHAT_KIND.to_owned()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Messages a client sends to the relay.
///
/// Directed kinds name a recipient with `to`; the sender is never part of the
/// payload, the relay stamps it from the connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Join {
        room: RoomId,
    },
    Leave {
        room: RoomId,
    },
    CallStarted {
        room: RoomId,
    },
    Offer {
        to: Identity,
        sdp: String,
    },
    Answer {
        to: Identity,
        sdp: String,
    },
    IceCandidate {
        to: Identity,
        candidate: IceCandidate,
    },
    EndCall {
        room: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<Identity>,
    },
    SendMessage {
        content: String,
        #[serde(default = "default_chat_kind")]
        kind: String,
    },
    GetMessages {
        #[serde(default = "default_history_limit")]
        limit: usize,
    },
    Typing {
        is_typing: bool,
    },
}

impl ClientMessage {
    pub fn op(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Leave { .. } => "leave",
            ClientMessage::CallStarted { .. } => "call-started",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::IceCandidate { .. } => "ice-candidate",
            ClientMessage::EndCall { .. } => "end-call",
            ClientMessage::SendMessage { .. } => "send-message",
            ClientMessage::GetMessages { .. } => "get-messages",
            ClientMessage::Typing { .. } => "typing",
        }
    }

    /// Checks the field contract that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::Join { room }
            | ClientMessage::Leave { room }
            | ClientMessage::CallStarted { room } => check_room(room),

            ClientMessage::Offer { to, sdp } | ClientMessage::Answer { to, sdp } => {
                check_target(to)?;
                if sdp.trim().is_empty() {
                    return Err(ProtocolError::EmptyField("sdp"));
                }
                Ok(())
            }

            ClientMessage::IceCandidate { to, candidate } => {
                check_target(to)?;
                if candidate.candidate.trim().is_empty() {
                    return Err(ProtocolError::EmptyField("candidate"));
                }
                Ok(())
            }

            ClientMessage::EndCall { room, to } => {
                check_room(room)?;
                match to {
                    Some(to) => check_target(to),
                    None => Ok(()),
                }
            }

            ClientMessage::SendMessage { content, .. } => {
                if content.trim().is_empty() {
                    return Err(ProtocolError::EmptyField("content"));
                }
                if content.len() > MAX_CHAT_CONTENT_BYTES {
                    return Err(ProtocolError::TooLarge {
                        field: "content",
                        limit: MAX_CHAT_CONTENT_BYTES,
                    });
                }
                Ok(())
            }

            ClientMessage::GetMessages { .. } | ClientMessage::Typing { .. } => Ok(()),
        }
    }

    /// Parses and validates a text frame in one step.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let msg: ClientMessage = serde_json::from_str(text)?;
        msg.validate()?;
        Ok(msg)
    }
}

fn check_room(room: &RoomId) -> Result<(), ProtocolError> {
    if room.is_empty() {
        return Err(ProtocolError::EmptyField("room"));
    }
    Ok(())
}

fn check_target(to: &Identity) -> Result<(), ProtocolError> {
    if to.is_empty() {
        return Err(ProtocolError::EmptyField("to"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    Malformed,
    NotInRoom,
}

/// Messages the relay sends to a client. `from` is always relay-assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Welcome {
        identity: Identity,
        username: String,
        ice_servers: Vec<IceServerConfig>,
    },
    Joined {
        room: RoomId,
        members: Vec<Member>,
    },
    UsersOnline {
        room: RoomId,
        members: Vec<Member>,
    },
    UserJoined {
        user_id: Identity,
        username: String,
    },
    UserLeft {
        user_id: Identity,
        username: String,
    },
    CallStarted {
        from: Identity,
        username: String,
    },
    Offer {
        from: Identity,
        username: String,
        sdp: String,
    },
    Answer {
        from: Identity,
        sdp: String,
    },
    IceCandidate {
        from: Identity,
        candidate: IceCandidate,
    },
    CallEnded {
        user_id: Identity,
        username: String,
    },
    NewMessage {
        message: ChatMessage,
    },
    Messages {
        messages: Vec<ChatMessage>,
    },
    UserTyping {
        user_id: Identity,
        username: String,
        is_typing: bool,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl ServerMessage {
    pub fn user_joined(member: &Member) -> Self {
        ServerMessage::UserJoined {
            user_id: member.user_id.clone(),
            username: member.username.clone(),
        }
    }

    pub fn user_left(member: &Member) -> Self {
        ServerMessage::UserLeft {
            user_id: member.user_id.clone(),
            username: member.username.clone(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}
