use crate::agent::CallCommand;
use crate::error::CallError;
use crate::media::{LocalMediaState, LocalStream, MediaConstraints, MediaTrackController};
use crate::session::SessionSnapshot;
use meshcall_core::utils::DEFAULT_CHAT_KIND;
use meshcall_core::{Identity, Member, RoomId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Cloneable front end of a running `CallAgent`.
///
/// Media acquisition and mute toggles go straight to the media controller so
/// a pending permission prompt never stalls signaling.
#[derive(Clone)]
pub struct CallHandle {
    me: Member,
    tx: mpsc::Sender<CallCommand>,
    media: MediaTrackController,
}

impl CallHandle {
    pub(crate) fn new(me: Member, tx: mpsc::Sender<CallCommand>, media: MediaTrackController) -> Self {
        Self { me, tx, media }
    }

    pub fn identity(&self) -> &Identity {
        &self.me.user_id
    }

    pub fn username(&self) -> &str {
        &self.me.username
    }

    async fn send(&self, cmd: CallCommand) -> Result<(), CallError> {
        self.tx.send(cmd).await.map_err(|_| CallError::AgentStopped)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> CallCommand) -> Result<T, CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| CallError::AgentStopped)
    }

    pub async fn join(&self, room: impl Into<RoomId>) -> Result<(), CallError> {
        self.send(CallCommand::Join(room.into())).await
    }

    pub async fn leave(&self) -> Result<(), CallError> {
        self.send(CallCommand::Leave).await
    }

    pub async fn acquire_media(&self, constraints: &MediaConstraints) -> Result<Arc<LocalStream>, CallError> {
        Ok(self.media.acquire(constraints).await?)
    }

    pub fn media_state(&self) -> LocalMediaState {
        self.media.state()
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.media.set_video_enabled(enabled);
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.media.set_audio_enabled(enabled);
    }

    pub fn toggle_video(&self) -> bool {
        self.media.toggle_video()
    }

    pub fn toggle_audio(&self) -> bool {
        self.media.toggle_audio()
    }

    /// Offers to every other room member. Returns how many offers went out.
    pub async fn start_call(&self) -> Result<usize, CallError> {
        self.request(CallCommand::StartCall).await?
    }

    pub async fn accept_call(&self, from: impl Into<Identity>) -> Result<(), CallError> {
        let from = from.into();
        self.request(|reply| CallCommand::AcceptCall { from, reply })
            .await?
    }

    pub async fn decline_call(&self, from: impl Into<Identity>) -> Result<(), CallError> {
        let from = from.into();
        self.request(|reply| CallCommand::DeclineCall { from, reply })
            .await?
    }

    pub async fn end_session(&self, remote: impl Into<Identity>) -> Result<bool, CallError> {
        let remote = remote.into();
        self.request(|reply| CallCommand::EndSession { remote, reply })
            .await
    }

    pub async fn end_call(&self) -> Result<(), CallError> {
        self.request(CallCommand::EndCall).await
    }

    pub async fn send_chat(&self, content: impl Into<String>) -> Result<(), CallError> {
        self.send(CallCommand::SendChat {
            content: content.into(),
            kind: DEFAULT_CHAT_KIND.to_owned(),
        })
        .await
    }

    pub async fn fetch_history(&self, limit: usize) -> Result<(), CallError> {
        self.send(CallCommand::FetchHistory(limit)).await
    }

    pub async fn set_typing(&self, is_typing: bool) -> Result<(), CallError> {
        self.send(CallCommand::Typing(is_typing)).await
    }

    pub async fn sessions(&self) -> Result<Vec<SessionSnapshot>, CallError> {
        self.request(CallCommand::Sessions).await
    }

    pub async fn roster(&self) -> Result<Vec<Member>, CallError> {
        self.request(CallCommand::Roster).await
    }

    /// Ends the call, leaves the room and stops the agent.
    pub async fn shutdown(&self) -> Result<(), CallError> {
        self.request(CallCommand::Shutdown).await
    }
}
