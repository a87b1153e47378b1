pub mod websocket_tests;

use meshcall_server::{RelayConfig, SignalingService};
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn create_test_service() -> SignalingService {
    SignalingService::new(&RelayConfig::default())
}
