use crate::agent::{CallCommand, CallHandle, RoomRoster};
use crate::config::ClientConfig;
use crate::error::CallError;
use crate::event::CallEvent;
use crate::media::{MediaDevices, MediaTrackController};
use crate::session::{ManagerChannels, PeerSessionManager};
use crate::signaling::{RelayClient, SignalingOutput};
use crate::transport::{PeerTransportFactory, RtcTransportFactory};
use anyhow::{Context, Result, bail};
use meshcall_core::{ClientMessage, IceServerConfig, Member, RoomId, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const WELCOME_TIMEOUT: Duration = Duration::from_secs(10);

/// The per-identity event loop: user commands, relay messages, transport
/// events and timers are all handled here, one at a time.
pub struct CallAgent {
    me: Member,
    manager: PeerSessionManager,
    channels: ManagerChannels,
    roster: RoomRoster,
    signaling: Arc<dyn SignalingOutput>,
    command_rx: mpsc::Receiver<CallCommand>,
    relay_rx: mpsc::UnboundedReceiver<ServerMessage>,
    event_tx: mpsc::UnboundedSender<CallEvent>,
}

impl CallAgent {
    pub fn new(
        me: Member,
        config: &ClientConfig,
        media: MediaTrackController,
        signaling: Arc<dyn SignalingOutput>,
        relay_rx: mpsc::UnboundedReceiver<ServerMessage>,
        factory: Arc<dyn PeerTransportFactory>,
    ) -> (Self, CallHandle, mpsc::UnboundedReceiver<CallEvent>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let (manager, channels) = PeerSessionManager::new(
            me.user_id.clone(),
            config,
            media.clone(),
            signaling.clone(),
            factory,
            event_tx.clone(),
        );

        let handle = CallHandle::new(me.clone(), command_tx, media);
        let agent = Self {
            me,
            manager,
            channels,
            roster: RoomRoster::new(),
            signaling,
            command_rx,
            relay_rx,
            event_tx,
        };

        (agent, handle, event_rx)
    }

    /// Connects to the relay and spawns an agent with `webrtc` transports.
    pub async fn connect(
        config: ClientConfig,
        devices: Arc<dyn MediaDevices>,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<CallEvent>, JoinHandle<()>)> {
        Self::connect_with(config, devices, |ice_servers| {
            Arc::new(RtcTransportFactory::new(ice_servers)) as Arc<dyn PeerTransportFactory>
        })
        .await
    }

    /// Like `connect`, with the transport factory built from the ICE servers
    /// the relay advertised (or the configured override).
    pub async fn connect_with<F>(
        config: ClientConfig,
        devices: Arc<dyn MediaDevices>,
        make_factory: F,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<CallEvent>, JoinHandle<()>)>
    where
        F: FnOnce(Vec<IceServerConfig>) -> Arc<dyn PeerTransportFactory>,
    {
        let (client, mut relay_rx) = RelayClient::connect(&config.connect_url()).await?;

        let first = tokio::time::timeout(WELCOME_TIMEOUT, relay_rx.recv())
            .await
            .context("Relay did not send a welcome")?;
        let Some(ServerMessage::Welcome {
            identity,
            username,
            ice_servers,
        }) = first
        else {
            bail!("Expected welcome from relay, got {:?}", first);
        };
        info!("Relay identified us as {} ({})", identity, username);

        let ice_servers = config.ice_servers.clone().unwrap_or(ice_servers);
        let factory = make_factory(ice_servers);
        let media = MediaTrackController::new(devices);

        let (agent, handle, events) = CallAgent::new(
            Member::new(identity, username),
            &config,
            media,
            Arc::new(client),
            relay_rx,
            factory,
        );
        let task = tokio::spawn(agent.run());

        Ok((handle, events, task))
    }

    pub async fn run(mut self) {
        info!("Call agent for {} started", self.me.user_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(CallCommand::Shutdown(done)) => {
                            self.shutdown().await;
                            let _ = done.send(());
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All call handles dropped. Shutting down agent.");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                msg = self.relay_rx.recv() => {
                    match msg {
                        Some(m) => self.handle_relay_message(m).await,
                        None => {
                            warn!("Relay connection lost");
                            self.manager.end_call().await;
                            break;
                        }
                    }
                }

                Some(event) = self.channels.transport_rx.recv() => {
                    self.manager.handle_transport_event(event).await;
                }

                Some(timer) = self.channels.timer_rx.recv() => {
                    self.manager.handle_timer(timer).await;
                }
            }
        }

        info!("Call agent for {} finished", self.me.user_id);
    }

    fn emit(&self, event: CallEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Call event dropped; nobody is listening");
        }
    }

    fn emit_roster(&self) {
        let Some(room) = self.roster.room().cloned() else {
            return;
        };
        self.emit(CallEvent::RosterChanged {
            room,
            members: self.roster.members(),
        });
    }

    /// Best effort: nothing here waits for the relay to acknowledge.
    async fn shutdown(&mut self) {
        self.manager.end_call().await;
        if let Some(room) = self.roster.room().cloned() {
            self.signaling.send(ClientMessage::Leave { room }).await;
        }
        self.roster.clear();
        self.manager.set_room(None);
    }

    async fn handle_command(&mut self, cmd: CallCommand) {
        match cmd {
            CallCommand::Join(room) => self.join(room).await,

            CallCommand::Leave => {
                let Some(room) = self.roster.room().cloned() else {
                    return;
                };
                self.manager.end_call().await;
                self.signaling.send(ClientMessage::Leave { room }).await;
                self.roster.clear();
                self.manager.set_room(None);
            }

            CallCommand::StartCall(reply) => {
                let result = match self.roster.room().cloned() {
                    Some(room) => {
                        let members = self.roster.others(&self.me.user_id);
                        self.manager.start_call(&room, &members).await
                    }
                    None => Err(CallError::NotInRoom),
                };
                let _ = reply.send(result);
            }

            CallCommand::AcceptCall { from, reply } => {
                let _ = reply.send(self.manager.accept_call(&from).await);
            }

            CallCommand::DeclineCall { from, reply } => {
                let _ = reply.send(self.manager.decline_call(&from).await);
            }

            CallCommand::EndSession { remote, reply } => {
                let _ = reply.send(self.manager.end_session(&remote).await);
            }

            CallCommand::EndCall(reply) => {
                self.manager.end_call().await;
                let _ = reply.send(());
            }

            CallCommand::SendChat { content, kind } => {
                self.signaling
                    .send(ClientMessage::SendMessage { content, kind })
                    .await;
            }

            CallCommand::FetchHistory(limit) => {
                self.signaling.send(ClientMessage::GetMessages { limit }).await;
            }

            CallCommand::Typing(is_typing) => {
                self.signaling.send(ClientMessage::Typing { is_typing }).await;
            }

            CallCommand::Sessions(reply) => {
                let _ = reply.send(self.manager.snapshots());
            }

            CallCommand::Roster(reply) => {
                let _ = reply.send(self.roster.members());
            }

            CallCommand::Shutdown(done) => {
                self.shutdown().await;
                let _ = done.send(());
            }
        }
    }

    async fn join(&mut self, room: RoomId) {
        let switching = self.roster.room().is_some_and(|current| *current != room);
        if switching {
            info!("Switching rooms; ending the current call");
            self.manager.end_call().await;
        }
        self.signaling.send(ClientMessage::Join { room }).await;
    }

    async fn handle_relay_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Welcome { identity, .. } => {
                debug!("Ignoring repeated welcome for {}", identity);
            }

            ServerMessage::Joined { room, members } => {
                info!("Joined room '{}' ({} present)", room, members.len());
                self.manager.set_room(Some(room.clone()));
                self.roster.replace(room, members);
                self.emit_roster();
            }

            ServerMessage::UsersOnline { room, members } => {
                if self.roster.room() != Some(&room) {
                    debug!("Ignoring presence for '{}'", room);
                    return;
                }
                self.roster.replace(room, members);
                self.emit_roster();
            }

            ServerMessage::UserJoined { user_id, username } => {
                debug!("{} joined", user_id);
                self.roster.insert(Member::new(user_id, username));
            }

            ServerMessage::UserLeft { user_id, .. } => {
                info!("{} left the room", user_id);
                self.roster.remove(&user_id);
                self.manager.handle_user_left(&user_id).await;
            }

            ServerMessage::CallStarted { from, username } => {
                info!("{} ({}) started a call", from, username);
            }

            ServerMessage::Offer { from, username, sdp } => {
                match self.manager.handle_offer(&from, &username, sdp).await {
                    Ok(outcome) => debug!("Offer from {}: {:?}", from, outcome),
                    Err(e) => warn!("Failed to handle offer from {}: {}", from, e),
                }
            }

            ServerMessage::Answer { from, sdp } => {
                match self.manager.handle_answer(&from, sdp).await {
                    Ok(outcome) => debug!("Answer from {}: {:?}", from, outcome),
                    Err(e) => warn!("Failed to apply answer from {}: {}", from, e),
                }
            }

            ServerMessage::IceCandidate { from, candidate } => {
                let outcome = self.manager.handle_ice_candidate(&from, candidate).await;
                debug!("Candidate from {}: {:?}", from, outcome);
            }

            ServerMessage::CallEnded { user_id, .. } => {
                if self.manager.handle_call_ended(&user_id).await {
                    info!("{} ended the call", user_id);
                }
            }

            ServerMessage::NewMessage { message } => self.emit(CallEvent::ChatMessage(message)),

            ServerMessage::Messages { messages } => self.emit(CallEvent::ChatHistory(messages)),

            ServerMessage::UserTyping {
                user_id,
                username,
                is_typing,
            } => self.emit(CallEvent::UserTyping {
                identity: user_id,
                username,
                is_typing,
            }),

            ServerMessage::Error { code, message } => {
                warn!("Relay error {:?}: {}", code, message);
                self.emit(CallEvent::RelayError { code, message });
            }
        }
    }
}
