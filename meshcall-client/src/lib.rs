pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod media;
pub mod monitor;
pub mod session;
pub mod signaling;
pub mod transport;

pub use agent::{CallAgent, CallHandle, RoomRoster};
pub use config::{ClientConfig, IncomingCallPolicy};
pub use error::{CallError, MediaError};
pub use event::CallEvent;
pub use media::{
    LocalMediaState, LocalStream, MediaConstraints, MediaDevices, MediaTrackController,
    SyntheticMediaDevices, TrackKind,
};
pub use session::{
    PeerSession, PeerSessionManager, SessionRole, SessionSnapshot, SessionState, SignalOutcome,
};
pub use signaling::{RelayClient, SignalingOutput};
pub use transport::{PeerTransport, PeerTransportFactory, RtcTransportFactory, TransportEvent};
