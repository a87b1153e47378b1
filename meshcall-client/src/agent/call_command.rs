use crate::error::CallError;
use crate::session::SessionSnapshot;
use meshcall_core::{Identity, Member, RoomId};
use tokio::sync::oneshot;

/// Requests handled by the `CallAgent` loop.
pub enum CallCommand {
    Join(RoomId),
    Leave,
    StartCall(oneshot::Sender<Result<usize, CallError>>),
    AcceptCall {
        from: Identity,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    DeclineCall {
        from: Identity,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    EndSession {
        remote: Identity,
        reply: oneshot::Sender<bool>,
    },
    EndCall(oneshot::Sender<()>),
    SendChat {
        content: String,
        kind: String,
    },
    FetchHistory(usize),
    Typing(bool),
    Sessions(oneshot::Sender<Vec<SessionSnapshot>>),
    Roster(oneshot::Sender<Vec<Member>>),
    Shutdown(oneshot::Sender<()>),
}
