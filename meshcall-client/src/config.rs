use meshcall_core::IceServerConfig;
use meshcall_core::utils::DEFAULT_RELAY_PORT;
use std::time::Duration;

/// What happens to an offer that arrives before local media is acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IncomingCallPolicy {
    /// Hold the offer, emit `IncomingCall` and wait for accept or decline.
    #[default]
    Defer,
    /// Drop the offer.
    Decline,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Websocket endpoint of the relay, without query string.
    pub relay_url: String,
    pub token: Option<String>,
    /// How long a disconnected session may recover before it is closed.
    pub grace_period: Duration,
    /// Close initiator sessions that never get an answer. `None` waits forever.
    pub offer_timeout: Option<Duration>,
    pub incoming_call_policy: IncomingCallPolicy,
    /// Overrides the ICE servers advertised by the relay.
    pub ice_servers: Option<Vec<IceServerConfig>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: format!("ws://127.0.0.1:{DEFAULT_RELAY_PORT}/ws"),
            token: None,
            grace_period: Duration::from_secs(2),
            offer_timeout: Some(Duration::from_secs(30)),
            incoming_call_policy: IncomingCallPolicy::default(),
            ice_servers: None,
        }
    }
}

impl ClientConfig {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Relay URL with the auth token appended.
    pub fn connect_url(&self) -> String {
        match &self.token {
            Some(token) => format!("{}?token={}", self.relay_url, token),
            None => self.relay_url.clone(),
        }
    }
}
