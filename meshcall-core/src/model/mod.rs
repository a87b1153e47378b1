mod chat;
mod identity;
mod room;
mod session;
mod signaling;

pub use chat::ChatMessage;
pub use identity::{Identity, Member};
pub use room::RoomId;
pub use session::SessionId;
pub use signaling::{ClientMessage, ErrorCode, IceCandidate, IceServerConfig, ServerMessage};
