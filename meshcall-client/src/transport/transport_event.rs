use crate::media::TrackKind;
use meshcall_core::{IceCandidate, SessionId};

/// Connectivity as reported by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub stream_id: String,
    pub track_id: String,
    pub kind: TrackKind,
}

/// Remote media as far as the presentation layer needs to know it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<RemoteTrackInfo>,
}

/// Events a transport reports back to the session manager. Each one carries
/// the id of the session that created the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    CandidateGenerated(SessionId, IceCandidate),
    StateChanged(SessionId, ConnectivityState),
    RemoteTrack(SessionId, RemoteTrackInfo),
}

impl TransportEvent {
    pub fn session(&self) -> SessionId {
        match self {
            TransportEvent::CandidateGenerated(id, _)
            | TransportEvent::StateChanged(id, _)
            | TransportEvent::RemoteTrack(id, _) => *id,
        }
    }
}
