use meshcall_core::Member;
use std::fmt;
use uuid::Uuid;

/// One websocket connection to the relay.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First six hex digits, used for anonymous identities.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..6].to_owned()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub connection: ConnectionId,
    pub member: Member,
}

impl Participant {
    pub fn new(connection: ConnectionId, member: Member) -> Self {
        Self { connection, member }
    }
}
