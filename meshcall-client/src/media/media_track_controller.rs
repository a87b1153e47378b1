use crate::error::{CallError, MediaError};
use crate::media::{LocalStream, MediaConstraints, MediaDevices, TrackKind};
use crate::transport::PeerTransport;
use meshcall_core::{Identity, SessionId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalMediaState {
    pub capture_active: bool,
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

#[derive(Default)]
struct ControllerState {
    stream: Option<Arc<LocalStream>>,
    video_enabled: bool,
    audio_enabled: bool,
    attached: HashSet<SessionId>,
}

/// Owns the local capture stream. Sessions only ever get a reference to it
/// through `attach`; only `release` stops its tracks.
#[derive(Clone)]
pub struct MediaTrackController {
    devices: Arc<dyn MediaDevices>,
    acquire_gate: Arc<tokio::sync::Mutex<()>>,
    state: Arc<Mutex<ControllerState>>,
}

impl MediaTrackController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            acquire_gate: Arc::new(tokio::sync::Mutex::new(())),
            state: Arc::new(Mutex::new(ControllerState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the active stream, requesting one from the devices if needed.
    ///
    /// An existing stream is returned as is after its tracks are re-enabled;
    /// the user is not prompted again. Concurrent callers are serialized, and
    /// the prompt is awaited without holding the state lock.
    pub async fn acquire(&self, constraints: &MediaConstraints) -> Result<Arc<LocalStream>, MediaError> {
        let _gate = self.acquire_gate.lock().await;

        if let Some(stream) = self.stream() {
            debug!("Reusing local stream {}", stream.id());
            self.set_video_enabled(true);
            self.set_audio_enabled(true);
            return Ok(stream);
        }

        let stream = Arc::new(self.devices.get_user_media(constraints).await?);
        info!(
            "Acquired local stream {} (audio: {}, video: {})",
            stream.id(),
            stream.has(TrackKind::Audio),
            stream.has(TrackKind::Video)
        );

        let mut state = self.lock();
        state.video_enabled = stream.has(TrackKind::Video);
        state.audio_enabled = stream.has(TrackKind::Audio);
        state.stream = Some(stream.clone());
        Ok(stream)
    }

    pub fn stream(&self) -> Option<Arc<LocalStream>> {
        self.lock().stream.clone()
    }

    pub fn is_active(&self) -> bool {
        self.lock().stream.is_some()
    }

    pub fn state(&self) -> LocalMediaState {
        let state = self.lock();
        LocalMediaState {
            capture_active: state.stream.is_some(),
            video_enabled: state.video_enabled,
            audio_enabled: state.audio_enabled,
        }
    }

    /// Local only: tracks stay attached and no session renegotiates.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.set_enabled(TrackKind::Video, enabled);
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.set_enabled(TrackKind::Audio, enabled);
    }

    /// Returns the resulting enablement; always false without a stream.
    pub fn toggle_video(&self) -> bool {
        let next = !self.state().video_enabled;
        self.set_video_enabled(next);
        self.state().video_enabled
    }

    pub fn toggle_audio(&self) -> bool {
        let next = !self.state().audio_enabled;
        self.set_audio_enabled(next);
        self.state().audio_enabled
    }

    fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        let mut state = self.lock();
        let Some(stream) = state.stream.clone() else {
            debug!("No local stream; ignoring {:?} toggle", kind);
            return;
        };
        if !stream.has(kind) {
            return;
        }
        stream.set_enabled(kind, enabled);
        match kind {
            TrackKind::Video => state.video_enabled = enabled,
            TrackKind::Audio => state.audio_enabled = enabled,
        }
    }

    /// Hands the shared stream to a session's transport.
    pub async fn attach(
        &self,
        session: SessionId,
        remote: &Identity,
        transport: &dyn PeerTransport,
    ) -> Result<(), CallError> {
        let stream = self.stream().ok_or(CallError::NoLocalStream)?;
        transport
            .attach_stream(stream)
            .await
            .map_err(|e| CallError::transport(remote, e))?;
        self.lock().attached.insert(session);
        debug!("Local stream attached to session {} ({})", session, remote);
        Ok(())
    }

    pub async fn detach(&self, session: SessionId, transport: &dyn PeerTransport) {
        if !self.lock().attached.remove(&session) {
            return;
        }
        if let Err(e) = transport.detach_stream().await {
            warn!("Failed to detach stream from session {}: {:?}", session, e);
        }
    }

    pub fn is_attached(&self, session: SessionId) -> bool {
        self.lock().attached.contains(&session)
    }

    pub fn attached_count(&self) -> usize {
        self.lock().attached.len()
    }

    /// Stops every track and forgets the stream.
    pub fn release(&self) {
        let mut state = self.lock();
        if let Some(stream) = state.stream.take() {
            stream.stop();
            info!("Released local stream {}", stream.id());
        }
        state.attached.clear();
        state.video_enabled = false;
        state.audio_enabled = false;
    }
}
