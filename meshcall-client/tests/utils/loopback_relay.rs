use async_trait::async_trait;
use meshcall_client::{
    CallAgent, CallEvent, CallHandle, ClientConfig, MediaTrackController, PeerTransportFactory,
    SignalingOutput, SyntheticMediaDevices,
};
use meshcall_core::{ClientMessage, Identity, Member, ServerMessage};
use meshcall_server::{ConnectionId, RelayConfig, SignalingService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default time to wait for one expected event (ms).
pub const EVENT_TIMEOUT_MS: u64 = 3000;

/// Delivers straight into an in-process relay service, no sockets involved.
pub struct LoopbackSignaling {
    service: SignalingService,
    connection: ConnectionId,
}

#[async_trait]
impl SignalingOutput for LoopbackSignaling {
    async fn send(&self, msg: ClientMessage) {
        self.service.handle_message(self.connection, msg);
    }
}

pub struct LoopbackRelay {
    pub service: SignalingService,
}

impl LoopbackRelay {
    pub fn new() -> Self {
        Self {
            service: SignalingService::new(&RelayConfig::default()),
        }
    }

    /// Spawns an agent identified by `token`. The welcome is consumed here.
    pub async fn spawn_agent(
        &self,
        token: &str,
        config: ClientConfig,
        devices: Arc<SyntheticMediaDevices>,
        factory: Arc<dyn PeerTransportFactory>,
    ) -> TestAgent {
        let connection = ConnectionId::new();
        let member = SignalingService::identify(connection, Some(token));
        let (tx, mut relay_rx) = mpsc::unbounded_channel();
        self.service.add_peer(connection, member.clone(), tx);

        match relay_rx.recv().await {
            Some(ServerMessage::Welcome { .. }) => {}
            other => panic!("expected welcome, got {:?}", other),
        }

        let signaling = Arc::new(LoopbackSignaling {
            service: self.service.clone(),
            connection,
        });
        let (agent, handle, events) = CallAgent::new(
            member.clone(),
            &config,
            MediaTrackController::new(devices),
            signaling,
            relay_rx,
            factory,
        );
        let task = tokio::spawn(agent.run());

        TestAgent {
            member,
            connection,
            handle,
            events,
            task,
        }
    }

    /// Drops the connection as if its socket closed.
    pub fn disconnect(&self, agent: &TestAgent) {
        self.service.remove_peer(agent.connection);
    }
}

pub struct TestAgent {
    pub member: Member,
    pub connection: ConnectionId,
    pub handle: CallHandle,
    pub events: mpsc::UnboundedReceiver<CallEvent>,
    pub task: JoinHandle<()>,
}

impl TestAgent {
    pub fn identity(&self) -> Identity {
        self.member.user_id.clone()
    }

    /// Waits for the first event matching `pred`, skipping the rest.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> Option<CallEvent>
    where
        F: FnMut(&CallEvent) -> bool,
    {
        wait_for_event(&mut self.events, &mut pred, EVENT_TIMEOUT_MS).await
    }
}

pub async fn wait_for_event<F>(
    events: &mut mpsc::UnboundedReceiver<CallEvent>,
    pred: &mut F,
    timeout_ms: u64,
) -> Option<CallEvent>
where
    F: FnMut(&CallEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(event)) if pred(&event) => return Some(event),
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => return None,
        }
    }
}

pub fn is_state(remote: &Identity, wanted: meshcall_client::SessionState) -> impl Fn(&CallEvent) -> bool {
    let remote = remote.clone();
    move |event| {
        matches!(
            event,
            CallEvent::SessionStateChanged { identity, state } if *identity == remote && *state == wanted
        )
    }
}
