use crate::transport::{PeerTransport, RemoteStream, RemoteTrackInfo};
use meshcall_core::{IceCandidate, Identity, SessionId};
use std::collections::VecDeque;
use std::fmt;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    OfferSent,
    OfferReceived,
    AnswerPending,
    Connecting,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Created, OfferSent | OfferReceived)
                | (OfferReceived, AnswerPending)
                | (AnswerPending, Connecting)
                | (OfferSent, Connecting)
                | (Connecting, Connected)
                | (Connecting | Connected, Failed)
                | (Created | OfferSent | OfferReceived | AnswerPending, Closed)
                | (Connecting | Connected | Failed, Closed)
        )
    }

    pub fn is_live(self) -> bool {
        !matches!(self, SessionState::Failed | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::OfferSent => "offer-sent",
            SessionState::OfferReceived => "offer-received",
            SessionState::AnswerPending => "answer-pending",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// The local side of one connection to one remote identity.
///
/// A session without a transport is a placeholder: candidates arrived before
/// the offer and are parked here until the offer adopts them.
pub struct PeerSession {
    id: SessionId,
    remote: Identity,
    role: SessionRole,
    state: SessionState,
    pub(crate) transport: Option<Box<dyn PeerTransport>>,
    pub(crate) local_tracks_attached: bool,
    pub(crate) remote_description_set: bool,
    pub(crate) pending_remote_candidates: VecDeque<IceCandidate>,
    /// The remote lost a glare tie-break; until its answer lands, its
    /// candidates belong to the transport it abandoned.
    pub(crate) remote_offer_abandoned: bool,
    remote_stream: Option<RemoteStream>,
    created_at: Instant,
}

impl PeerSession {
    pub fn new(remote: Identity, role: SessionRole) -> Self {
        Self {
            id: SessionId::new(),
            remote,
            role,
            state: SessionState::Created,
            transport: None,
            local_tracks_attached: false,
            remote_description_set: false,
            pending_remote_candidates: VecDeque::new(),
            remote_offer_abandoned: false,
            remote_stream: None,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn remote(&self) -> &Identity {
        &self.remote
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_placeholder(&self) -> bool {
        self.transport.is_none()
    }

    pub fn local_tracks_attached(&self) -> bool {
        self.local_tracks_attached
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_remote_candidates.len()
    }

    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote_stream.as_ref()
    }

    /// Moves to `next` if the state machine allows it.
    pub(crate) fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn take_pending(&mut self) -> VecDeque<IceCandidate> {
        std::mem::take(&mut self.pending_remote_candidates)
    }

    /// Records a remote track; returns the updated stream when it is new.
    pub(crate) fn add_remote_track(&mut self, info: RemoteTrackInfo) -> Option<RemoteStream> {
        let stream = self.remote_stream.get_or_insert_with(|| RemoteStream {
            id: info.stream_id.clone(),
            tracks: Vec::new(),
        });
        if stream.tracks.iter().any(|t| t.track_id == info.track_id) {
            return None;
        }
        stream.tracks.push(info);
        Some(stream.clone())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            remote: self.remote.clone(),
            role: self.role,
            state: self.state,
            local_tracks_attached: self.local_tracks_attached,
            pending_candidates: self.pending_remote_candidates.len(),
            placeholder: self.is_placeholder(),
        }
    }
}

/// Read-only copy of a session for callers outside the agent task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub remote: Identity,
    pub role: SessionRole,
    pub state: SessionState,
    pub local_tracks_attached: bool,
    pub pending_candidates: usize,
    pub placeholder: bool,
}
