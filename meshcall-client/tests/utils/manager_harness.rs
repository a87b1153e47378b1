use crate::utils::{MockSignalingOutput, MockTransportFactory};
use meshcall_client::session::ManagerChannels;
use meshcall_client::{
    CallEvent, ClientConfig, MediaConstraints, MediaTrackController, PeerSessionManager,
    SyntheticMediaDevices,
};
use meshcall_core::{Identity, RoomId};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const TEST_ROOM: &str = "r1";

/// One `PeerSessionManager` wired to mocks, driven by hand from the test.
pub struct ManagerHarness {
    pub manager: PeerSessionManager,
    pub channels: ManagerChannels,
    pub signaling: MockSignalingOutput,
    pub factory: Arc<MockTransportFactory>,
    pub media: MediaTrackController,
    pub events: mpsc::UnboundedReceiver<CallEvent>,
}

impl ManagerHarness {
    pub fn new(local: &str, config: ClientConfig) -> Self {
        Self::with_factory(local, config, MockTransportFactory::new())
    }

    pub fn with_factory(local: &str, config: ClientConfig, factory: Arc<MockTransportFactory>) -> Self {
        let (signaling, _outbox) = MockSignalingOutput::new();
        let media = MediaTrackController::new(SyntheticMediaDevices::new().shared());
        let (event_tx, events) = mpsc::unbounded_channel();

        let (mut manager, channels) = PeerSessionManager::new(
            Identity::from(local),
            &config,
            media.clone(),
            Arc::new(signaling.clone()),
            factory.clone(),
            event_tx,
        );
        manager.set_room(Some(RoomId::from(TEST_ROOM)));

        Self {
            manager,
            channels,
            signaling,
            factory,
            media,
            events,
        }
    }

    /// A harness whose local stream is already acquired.
    pub async fn with_media(local: &str) -> Self {
        let harness = Self::new(local, test_config());
        harness
            .media
            .acquire(&MediaConstraints::default())
            .await
            .unwrap();
        harness
    }

    pub fn room(&self) -> RoomId {
        RoomId::from(TEST_ROOM)
    }

    pub fn drain_events(&mut self) -> Vec<CallEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Feeds every queued transport event back into the manager.
    pub async fn pump_transport(&mut self) {
        while let Ok(event) = self.channels.transport_rx.try_recv() {
            self.manager.handle_transport_event(event).await;
        }
    }

    /// Waits for the next timer to fire and hands it to the manager.
    pub async fn next_timer(&mut self) {
        if let Some(timer) = self.channels.timer_rx.recv().await {
            self.manager.handle_timer(timer).await;
        }
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new("ws://127.0.0.1:4001/ws")
}

pub fn id(s: &str) -> Identity {
    Identity::from(s)
}
