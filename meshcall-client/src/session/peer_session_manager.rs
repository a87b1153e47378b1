use crate::config::{ClientConfig, IncomingCallPolicy};
use crate::error::CallError;
use crate::event::CallEvent;
use crate::media::MediaTrackController;
use crate::monitor::{ConnectionMonitor, TimerEvent};
use crate::session::{PeerSession, SessionRole, SessionSnapshot, SessionState};
use crate::signaling::SignalingOutput;
use crate::transport::{
    ConnectivityState, PeerTransport, PeerTransportFactory, SdpKind, TransportEvent,
};
use meshcall_core::{IceCandidate, Identity, RoomId, SessionId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What became of one inbound signaling message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Applied,
    /// Parked until a remote description exists.
    Queued,
    /// Held for `accept_call` / `decline_call`.
    Deferred,
    Declined,
    /// Crossing offer lost the tie-break; our own offer stands.
    GlareIgnored,
    /// References a session that no longer exists. Expected during teardown.
    StaleMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Local,
    Remote,
    Replaced,
    TransportLost,
    TimedOut,
}

struct DeferredOffer {
    username: String,
    sdp: String,
}

enum PriorSession {
    None,
    Placeholder,
    OwnOfferWins,
    OwnOfferYields,
    Superseded(SessionState),
}

/// Receivers the owner of the manager has to poll.
pub struct ManagerChannels {
    pub transport_rx: mpsc::Receiver<TransportEvent>,
    pub timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
}

/// Owns every peer session of one local identity. Single writer: all
/// mutation happens through `&mut self`, driven by one event loop.
pub struct PeerSessionManager {
    local: Identity,
    room: Option<RoomId>,
    sessions: HashMap<Identity, PeerSession>,
    deferred: HashMap<Identity, DeferredOffer>,
    declined: HashSet<Identity>,
    /// Remotes whose session we closed; their in-flight candidates are stale.
    retired: HashSet<Identity>,
    policy: IncomingCallPolicy,
    media: MediaTrackController,
    signaling: Arc<dyn SignalingOutput>,
    factory: Arc<dyn PeerTransportFactory>,
    monitor: ConnectionMonitor,
    transport_tx: mpsc::Sender<TransportEvent>,
    event_tx: mpsc::UnboundedSender<CallEvent>,
}

impl PeerSessionManager {
    pub fn new(
        local: Identity,
        config: &ClientConfig,
        media: MediaTrackController,
        signaling: Arc<dyn SignalingOutput>,
        factory: Arc<dyn PeerTransportFactory>,
        event_tx: mpsc::UnboundedSender<CallEvent>,
    ) -> (Self, ManagerChannels) {
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (monitor, timer_rx) = ConnectionMonitor::new(config.grace_period, config.offer_timeout);

        let manager = Self {
            local,
            room: None,
            sessions: HashMap::new(),
            deferred: HashMap::new(),
            declined: HashSet::new(),
            retired: HashSet::new(),
            policy: config.incoming_call_policy,
            media,
            signaling,
            factory,
            monitor,
            transport_tx,
            event_tx,
        };

        (
            manager,
            ManagerChannels {
                transport_rx,
                timer_rx,
            },
        )
    }

    pub fn local_identity(&self) -> &Identity {
        &self.local
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn set_room(&mut self, room: Option<RoomId>) {
        self.room = room;
    }

    pub fn media(&self) -> &MediaTrackController {
        &self.media
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn session(&self, remote: &Identity) -> Option<&PeerSession> {
        self.sessions.get(remote)
    }

    /// Sessions ordered by remote identity.
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        let mut out: Vec<_> = self.sessions.values().map(PeerSession::snapshot).collect();
        out.sort_by(|a, b| a.remote.cmp(&b.remote));
        out
    }

    /// Sessions that own a transport.
    pub fn active_session_count(&self) -> usize {
        self.sessions.values().filter(|s| !s.is_placeholder()).count()
    }

    pub fn has_incoming_call(&self, from: &Identity) -> bool {
        self.deferred.contains_key(from)
    }

    fn emit(&self, event: CallEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Call event dropped; nobody is listening");
        }
    }

    fn emit_state(&self, remote: &Identity, state: SessionState) {
        self.emit(CallEvent::SessionStateChanged {
            identity: remote.clone(),
            state,
        });
    }

    /// Offers to every member without a session, answering held offers first.
    ///
    /// Requires an acquired local stream. Failures are scoped to the peer
    /// they happen with; the returned count is the number of offers sent.
    pub async fn start_call(&mut self, room: &RoomId, members: &[Identity]) -> Result<usize, CallError> {
        if !self.media.is_active() {
            return Err(CallError::NoLocalStream);
        }
        self.room = Some(room.clone());
        info!("Starting call in '{}'", room);

        let mut offered = 0;
        for remote in members {
            if *remote == self.local {
                continue;
            }

            if self.deferred.contains_key(remote) {
                if let Err(e) = self.accept_call(remote).await {
                    warn!("Failed to answer held call from {}: {}", remote, e);
                }
                continue;
            }

            let existing = self
                .sessions
                .get(remote)
                .map(|s| (s.is_placeholder(), s.state()));
            match existing {
                Some((false, state)) => {
                    debug!("Already in a session with {} ({})", remote, state);
                    continue;
                }
                Some((true, _)) => {
                    debug!("Dropping parked candidates from {}", remote);
                    self.sessions.remove(remote);
                }
                None => {}
            }

            match self.offer_to(remote).await {
                Ok(()) => offered += 1,
                Err(e) => warn!("Could not call {}: {}", remote, e),
            }
        }

        self.signaling.announce_call_started(room.clone()).await;
        Ok(offered)
    }

    async fn offer_to(&mut self, remote: &Identity) -> Result<(), CallError> {
        self.declined.remove(remote);
        self.retired.remove(remote);

        let mut session = PeerSession::new(remote.clone(), SessionRole::Initiator);
        let id = session.id();
        let transport = self
            .factory
            .create(id, remote, self.transport_tx.clone())
            .await
            .map_err(|e| CallError::transport(remote, e))?;

        let sdp = match self.prepare_offer(id, remote, transport.as_ref()).await {
            Ok(sdp) => sdp,
            Err(e) => {
                self.media.detach(id, transport.as_ref()).await;
                let _ = transport.close().await;
                return Err(e);
            }
        };

        session.transport = Some(transport);
        session.local_tracks_attached = true;
        session.advance(SessionState::OfferSent);
        self.sessions.insert(remote.clone(), session);
        self.emit_state(remote, SessionState::OfferSent);

        debug!("Sending offer to {}", remote);
        self.signaling.send_offer(remote.clone(), sdp).await;
        self.monitor.arm_offer_timeout(remote, id);
        Ok(())
    }

    async fn prepare_offer(
        &self,
        id: SessionId,
        remote: &Identity,
        transport: &dyn PeerTransport,
    ) -> Result<String, CallError> {
        self.media.attach(id, remote, transport).await?;
        transport
            .create_offer()
            .await
            .map_err(|e| CallError::negotiation(remote, e))
    }

    fn classify_prior(&self, from: &Identity) -> PriorSession {
        let Some(existing) = self.sessions.get(from) else {
            return PriorSession::None;
        };
        if existing.is_placeholder() {
            return PriorSession::Placeholder;
        }
        if existing.role() == SessionRole::Initiator && existing.state() == SessionState::OfferSent {
            // Lower identity keeps the initiator role; both ends compute the same answer.
            if self.local < *from {
                return PriorSession::OwnOfferWins;
            }
            return PriorSession::OwnOfferYields;
        }
        PriorSession::Superseded(existing.state())
    }

    pub async fn handle_offer(
        &mut self,
        from: &Identity,
        username: &str,
        sdp: String,
    ) -> Result<SignalOutcome, CallError> {
        let carried = match self.classify_prior(from) {
            PriorSession::None => VecDeque::new(),
            PriorSession::Placeholder => self.take_for_offer(from).await,
            PriorSession::OwnOfferWins => {
                info!("Glare with {}: keeping our offer", from);
                if let Some(session) = self.sessions.get_mut(from) {
                    // their losing transport keeps trickling until they answer
                    session.pending_remote_candidates.clear();
                    session.remote_offer_abandoned = true;
                }
                return Ok(SignalOutcome::GlareIgnored);
            }
            PriorSession::OwnOfferYields => {
                info!("Glare with {}: yielding to their offer", from);
                self.take_for_offer(from).await
            }
            PriorSession::Superseded(state) => {
                info!("New offer from {} replaces session in state {}", from, state);
                self.take_for_offer(from).await;
                VecDeque::new()
            }
        };
        self.declined.remove(from);
        self.retired.remove(from);

        if !self.media.is_active() {
            return Ok(self.hold_offer(from, username, sdp, carried).await);
        }

        self.answer_offer(from, sdp, carried).await?;
        Ok(SignalOutcome::Applied)
    }

    /// Removes the current session for `from`, closing it if it owns a
    /// transport, and hands back its parked candidates.
    async fn take_for_offer(&mut self, from: &Identity) -> VecDeque<IceCandidate> {
        let Some(mut session) = self.sessions.remove(from) else {
            return VecDeque::new();
        };
        let pending = session.take_pending();
        if !session.is_placeholder() {
            self.close_session(session, CloseReason::Replaced).await;
        }
        pending
    }

    async fn hold_offer(
        &mut self,
        from: &Identity,
        username: &str,
        sdp: String,
        carried: VecDeque<IceCandidate>,
    ) -> SignalOutcome {
        match self.policy {
            IncomingCallPolicy::Decline => {
                info!("Declining call from {}: no local media", from);
                self.deferred.remove(from);
                self.declined.insert(from.clone());
                self.notify_call_ended(from).await;
                SignalOutcome::Declined
            }
            IncomingCallPolicy::Defer => {
                let mut placeholder = PeerSession::new(from.clone(), SessionRole::Responder);
                placeholder.pending_remote_candidates = carried;
                self.sessions.insert(from.clone(), placeholder);

                let offer = DeferredOffer {
                    username: username.to_owned(),
                    sdp,
                };
                if self.deferred.insert(from.clone(), offer).is_none() {
                    info!("Incoming call from {}", from);
                    self.emit(CallEvent::IncomingCall {
                        from: from.clone(),
                        username: username.to_owned(),
                    });
                }
                SignalOutcome::Deferred
            }
        }
    }

    /// Answers a held offer. Media must be acquired first.
    pub async fn accept_call(&mut self, from: &Identity) -> Result<(), CallError> {
        if !self.media.is_active() {
            return Err(CallError::NoLocalStream);
        }
        let Some(offer) = self.deferred.remove(from) else {
            return Err(CallError::NoIncomingCall(from.clone()));
        };
        info!("Accepting call from {} ({})", from, offer.username);

        let carried = self.take_for_offer(from).await;
        self.answer_offer(from, offer.sdp, carried).await
    }

    /// Drops a held offer and tells the caller.
    pub async fn decline_call(&mut self, from: &Identity) -> Result<(), CallError> {
        if self.deferred.remove(from).is_none() {
            return Err(CallError::NoIncomingCall(from.clone()));
        }
        if self.sessions.get(from).is_some_and(PeerSession::is_placeholder) {
            self.sessions.remove(from);
        }
        self.declined.insert(from.clone());
        info!("Declined call from {}", from);
        self.notify_call_ended(from).await;
        Ok(())
    }

    async fn notify_call_ended(&self, remote: &Identity) {
        let Some(room) = self.room.clone() else {
            return;
        };
        self.signaling
            .announce_call_ended(room, Some(remote.clone()))
            .await;
    }

    async fn answer_offer(
        &mut self,
        from: &Identity,
        sdp: String,
        carried: VecDeque<IceCandidate>,
    ) -> Result<(), CallError> {
        let mut session = PeerSession::new(from.clone(), SessionRole::Responder);
        session.pending_remote_candidates = carried;
        session.advance(SessionState::OfferReceived);
        self.emit_state(from, SessionState::OfferReceived);

        let transport = match self
            .factory
            .create(session.id(), from, self.transport_tx.clone())
            .await
        {
            Ok(transport) => transport,
            Err(e) => {
                session.advance(SessionState::Closed);
                self.emit_state(from, SessionState::Closed);
                return Err(CallError::transport(from, e));
            }
        };

        let result = self
            .negotiate_answer(&mut session, transport.as_ref(), sdp)
            .await;
        session.transport = Some(transport);

        match result {
            Ok(answer) => {
                session.advance(SessionState::Connecting);
                self.sessions.insert(from.clone(), session);
                self.signaling.send_answer(from.clone(), answer).await;
                self.emit_state(from, SessionState::Connecting);
                Ok(())
            }
            Err(e) => {
                self.close_session(session, CloseReason::Local).await;
                Err(e)
            }
        }
    }

    async fn negotiate_answer(
        &self,
        session: &mut PeerSession,
        transport: &dyn PeerTransport,
        sdp: String,
    ) -> Result<String, CallError> {
        let remote = session.remote().clone();

        self.media.attach(session.id(), &remote, transport).await?;
        session.local_tracks_attached = true;

        transport
            .set_remote_description(SdpKind::Offer, sdp)
            .await
            .map_err(|e| CallError::negotiation(&remote, e))?;
        session.remote_description_set = true;
        drain_candidates(session, transport).await;

        session.advance(SessionState::AnswerPending);
        self.emit_state(&remote, SessionState::AnswerPending);

        transport
            .create_answer()
            .await
            .map_err(|e| CallError::negotiation(&remote, e))
    }

    pub async fn handle_answer(&mut self, from: &Identity, sdp: String) -> Result<SignalOutcome, CallError> {
        let Some(session) = self.sessions.get_mut(from) else {
            debug!("Stale answer from {}: no session", from);
            return Ok(SignalOutcome::StaleMessage);
        };
        if session.role() != SessionRole::Initiator || session.state() != SessionState::OfferSent {
            debug!("Stale answer from {}: session is {}", from, session.state());
            return Ok(SignalOutcome::StaleMessage);
        }
        let Some(transport) = session.transport.take() else {
            return Ok(SignalOutcome::StaleMessage);
        };

        let id = session.id();
        let result = apply_remote_answer(session, transport.as_ref(), sdp).await;
        session.transport = Some(transport);

        match result {
            Ok(()) => {
                session.advance(SessionState::Connecting);
                self.monitor.cancel_offer_timeout(id);
                self.emit_state(from, SessionState::Connecting);
                Ok(SignalOutcome::Applied)
            }
            Err(e) => {
                let remote = from.clone();
                if let Some(session) = self.sessions.remove(&remote) {
                    self.close_session(session, CloseReason::Local).await;
                }
                Err(CallError::negotiation(&remote, e))
            }
        }
    }

    /// Applies the candidate now if the remote description is set, parks it
    /// otherwise. A candidate with no session parks in a new placeholder,
    /// unless we already closed or declined a session with that remote.
    pub async fn handle_ice_candidate(&mut self, from: &Identity, candidate: IceCandidate) -> SignalOutcome {
        if !self.sessions.contains_key(from) {
            if self.declined.contains(from) {
                debug!("Dropping candidate from declined caller {}", from);
                return SignalOutcome::StaleMessage;
            }
            if self.retired.contains(from) {
                debug!("Dropping candidate from closed session with {}", from);
                return SignalOutcome::StaleMessage;
            }
            debug!("Candidate from {} arrived before its offer", from);
            let mut placeholder = PeerSession::new(from.clone(), SessionRole::Responder);
            placeholder.pending_remote_candidates.push_back(candidate);
            self.sessions.insert(from.clone(), placeholder);
            return SignalOutcome::Queued;
        }

        let Some(session) = self.sessions.get_mut(from) else {
            return SignalOutcome::StaleMessage;
        };
        if session.remote_offer_abandoned && !session.remote_description_set {
            debug!("Dropping candidate from {}'s abandoned offer", from);
            return SignalOutcome::StaleMessage;
        }
        let ready = session.remote_description_set && session.transport.is_some();
        if !ready {
            session.pending_remote_candidates.push_back(candidate);
            return SignalOutcome::Queued;
        }

        if let Some(transport) = session.transport.as_deref() {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Failed to add ICE candidate from {}: {:?}", from, e);
            }
        }
        SignalOutcome::Applied
    }

    /// Closes the session with `remote` and tells it so.
    pub async fn end_session(&mut self, remote: &Identity) -> bool {
        self.deferred.remove(remote);
        let Some(session) = self.sessions.remove(remote) else {
            return false;
        };
        self.notify_call_ended(remote).await;
        self.close_session(session, CloseReason::Local).await;
        true
    }

    /// Closes every session, tells the room and releases the local stream.
    pub async fn end_call(&mut self) {
        if let Some(room) = self.room.clone() {
            self.signaling.announce_call_ended(room, None).await;
        }

        let sessions: Vec<_> = self.sessions.drain().map(|(_, s)| s).collect();
        for session in sessions {
            self.close_session(session, CloseReason::Local).await;
        }
        self.deferred.clear();
        self.declined.clear();
        self.monitor.cancel_all();
        self.media.release();
        info!("Call ended");
    }

    /// Room departure is authoritative over any transport state.
    pub async fn handle_user_left(&mut self, remote: &Identity) -> bool {
        self.declined.remove(remote);
        let had_session = self.drop_peer(remote).await;
        self.retired.remove(remote);
        had_session
    }

    pub async fn handle_call_ended(&mut self, remote: &Identity) -> bool {
        self.drop_peer(remote).await
    }

    async fn drop_peer(&mut self, remote: &Identity) -> bool {
        self.deferred.remove(remote);
        let Some(session) = self.sessions.remove(remote) else {
            return false;
        };
        self.close_session(session, CloseReason::Remote).await;
        true
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let id = event.session();
        let Some(remote) = self.remote_for(id) else {
            debug!("Ignoring event from retired session {}", id);
            return;
        };

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                self.signaling.send_ice(remote, candidate).await;
            }
            TransportEvent::StateChanged(_, state) => {
                self.on_connectivity(&remote, id, state).await;
            }
            TransportEvent::RemoteTrack(_, info) => {
                let stream = self
                    .sessions
                    .get_mut(&remote)
                    .and_then(|session| session.add_remote_track(info));
                if let Some(stream) = stream {
                    self.emit(CallEvent::RemoteStreamAvailable {
                        identity: remote,
                        stream,
                    });
                }
            }
        }
    }

    async fn on_connectivity(&mut self, remote: &Identity, id: SessionId, state: ConnectivityState) {
        match state {
            ConnectivityState::Connected => {
                self.monitor.on_connected(id);
                let advanced = self
                    .sessions
                    .get_mut(remote)
                    .is_some_and(|s| s.advance(SessionState::Connected));
                if advanced {
                    info!("Connected to {}", remote);
                    self.emit_state(remote, SessionState::Connected);
                }
            }
            ConnectivityState::Disconnected => {
                warn!(
                    "Transport to {} disconnected; grace period {:?}",
                    remote,
                    self.monitor.grace_period()
                );
                self.monitor.on_disconnected(remote, id);
            }
            ConnectivityState::Failed | ConnectivityState::Closed => {
                warn!("Transport to {} is {:?}", remote, state);
                if let Some(session) = self.sessions.remove(remote) {
                    self.close_session(session, CloseReason::TransportLost).await;
                }
            }
            ConnectivityState::New | ConnectivityState::Connecting => {}
        }
    }

    pub async fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::GraceExpired { remote, session } => {
                if !self.monitor.take_grace_expired(session) || self.remote_for(session).is_none() {
                    return;
                }
                warn!("{} did not recover within the grace period", remote);
                if let Some(s) = self.sessions.remove(&remote) {
                    self.close_session(s, CloseReason::TransportLost).await;
                }
            }
            TimerEvent::OfferTimedOut { remote, session } => {
                if !self.monitor.take_offer_timed_out(session) {
                    return;
                }
                let waiting = self
                    .sessions
                    .get(&remote)
                    .is_some_and(|s| s.id() == session && s.state() == SessionState::OfferSent);
                if !waiting {
                    return;
                }
                warn!("No answer from {}; giving up", remote);
                self.notify_call_ended(&remote).await;
                if let Some(s) = self.sessions.remove(&remote) {
                    self.close_session(s, CloseReason::TimedOut).await;
                }
            }
        }
    }

    fn remote_for(&self, id: SessionId) -> Option<Identity> {
        self.sessions
            .values()
            .find(|s| s.id() == id)
            .map(|s| s.remote().clone())
    }

    async fn close_session(&mut self, mut session: PeerSession, reason: CloseReason) {
        let id = session.id();
        let remote = session.remote().clone();
        self.monitor.cancel(id);

        if reason == CloseReason::TransportLost && session.advance(SessionState::Failed) {
            self.emit_state(&remote, SessionState::Failed);
        }

        let had_transport = !session.is_placeholder();
        if let Some(transport) = session.transport.take() {
            self.media.detach(id, transport.as_ref()).await;
            session.local_tracks_attached = false;
            if let Err(e) = transport.close().await {
                warn!("Failed to close transport to {}: {:?}", remote, e);
            }
        }
        session.pending_remote_candidates.clear();
        session.advance(SessionState::Closed);
        if reason != CloseReason::Replaced {
            self.retired.insert(remote.clone());
        }

        if !had_transport {
            debug!("Dropped placeholder for {}", remote);
            return;
        }

        info!("Session with {} closed ({:?})", remote, reason);
        self.emit_state(&remote, SessionState::Closed);
        if session.remote_stream().is_some() {
            self.emit(CallEvent::RemoteStreamRemoved {
                identity: remote.clone(),
            });
        }
        match reason {
            CloseReason::TransportLost => self.emit(CallEvent::PeerDisconnected { identity: remote }),
            CloseReason::TimedOut => self.emit(CallEvent::OfferTimedOut { identity: remote }),
            CloseReason::Local | CloseReason::Remote | CloseReason::Replaced => {}
        }
    }
}

async fn apply_remote_answer(
    session: &mut PeerSession,
    transport: &dyn PeerTransport,
    sdp: String,
) -> anyhow::Result<()> {
    transport.set_remote_description(SdpKind::Answer, sdp).await?;
    session.remote_description_set = true;
    session.remote_offer_abandoned = false;
    drain_candidates(session, transport).await;
    Ok(())
}

/// Applies parked candidates in arrival order.
async fn drain_candidates(session: &mut PeerSession, transport: &dyn PeerTransport) {
    let pending = session.take_pending();
    if !pending.is_empty() {
        debug!(
            "Applying {} queued candidate(s) from {}",
            pending.len(),
            session.remote()
        );
    }
    for candidate in pending {
        if let Err(e) = transport.add_ice_candidate(candidate).await {
            warn!("Failed to add queued ICE candidate from {}: {:?}", session.remote(), e);
        }
    }
}
