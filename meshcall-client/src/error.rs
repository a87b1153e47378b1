use meshcall_core::Identity;
use thiserror::Error;

/// Capture failures. The two device cases must stay distinct so the caller
/// can tell "user said no" from "there is no camera".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission to use the camera or microphone was denied")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("neither audio nor video was requested")]
    NothingRequested,
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("permission to use the camera or microphone was denied")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Usage error: a call was started or answered before media was acquired.
    #[error("no local stream; acquire media before starting or answering a call")]
    NoLocalStream,

    #[error("not in a room")]
    NotInRoom,

    #[error("no incoming call from {0}")]
    NoIncomingCall(Identity),

    #[error("transport to {remote} failed: {reason}")]
    TransportFailed { remote: Identity, reason: String },

    #[error("negotiation with {remote} failed: {reason}")]
    Negotiation { remote: Identity, reason: String },

    #[error("call agent has stopped")]
    AgentStopped,
}

impl CallError {
    pub(crate) fn transport(remote: &Identity, err: anyhow::Error) -> Self {
        CallError::TransportFailed {
            remote: remote.clone(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn negotiation(remote: &Identity, err: anyhow::Error) -> Self {
        CallError::Negotiation {
            remote: remote.clone(),
            reason: format!("{err:#}"),
        }
    }

    /// Errors that need a user decision before retrying.
    pub fn needs_user_action(&self) -> bool {
        matches!(
            self,
            CallError::PermissionDenied | CallError::DeviceUnavailable(_) | CallError::NoLocalStream
        )
    }
}

impl From<MediaError> for CallError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied => CallError::PermissionDenied,
            MediaError::DeviceUnavailable(device) => CallError::DeviceUnavailable(device),
            MediaError::NothingRequested => CallError::DeviceUnavailable("nothing requested".into()),
        }
    }
}
