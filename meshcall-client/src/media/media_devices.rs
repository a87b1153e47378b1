use crate::error::MediaError;
use crate::media::{LocalStream, LocalTrack, TrackKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// Source of capture streams. May wait on a human permission prompt, so
/// callers must not put a timeout on it.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<LocalStream, MediaError>;
}

/// Headless capture source with configurable devices and permission.
#[derive(Debug)]
pub struct SyntheticMediaDevices {
    camera: bool,
    microphone: bool,
    permission_granted: bool,
    prompt_delay: Option<Duration>,
    requests: AtomicUsize,
}

impl Default for SyntheticMediaDevices {
    fn default() -> Self {
        Self {
            camera: true,
            microphone: true,
            permission_granted: true,
            prompt_delay: None,
            requests: AtomicUsize::new(0),
        }
    }
}

impl SyntheticMediaDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_camera(mut self) -> Self {
        self.camera = false;
        self
    }

    pub fn without_microphone(mut self) -> Self {
        self.microphone = false;
        self
    }

    pub fn denying_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// Simulates a user taking this long to answer the prompt.
    pub fn with_prompt_delay(mut self, delay: Duration) -> Self {
        self.prompt_delay = Some(delay);
        self
    }

    /// Number of times a stream was requested.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl MediaDevices for SyntheticMediaDevices {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<LocalStream, MediaError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        debug!("Synthetic capture requested: {:?}", constraints);

        if let Some(delay) = self.prompt_delay {
            tokio::time::sleep(delay).await;
        }

        if !constraints.video && !constraints.audio {
            return Err(MediaError::NothingRequested);
        }
        if !self.permission_granted {
            return Err(MediaError::PermissionDenied);
        }
        if constraints.video && !self.camera {
            return Err(MediaError::DeviceUnavailable("camera".into()));
        }
        if constraints.audio && !self.microphone {
            return Err(MediaError::DeviceUnavailable("microphone".into()));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack::new(TrackKind::Audio));
        }
        if constraints.video {
            tracks.push(LocalTrack::new(TrackKind::Video));
        }
        Ok(LocalStream::new(tracks))
    }
}
