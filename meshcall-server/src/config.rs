use meshcall_core::IceServerConfig;
use meshcall_core::utils::{DEFAULT_RELAY_PORT, DEFAULT_STUN_ADDR};
use std::net::SocketAddr;

/// Relay settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    /// Advertised to every client in the welcome message.
    pub ice_servers: Vec<IceServerConfig>,
    /// Chat messages retained per room.
    pub chat_history_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_RELAY_PORT)),
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)],
            chat_history_limit: 500,
        }
    }
}
