pub mod chat;
pub mod config;
pub mod registry;
pub mod signaling;

pub use chat::ChatStore;
pub use config::RelayConfig;
pub use registry::*;
pub use signaling::*;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use axum::Json;
use serde_json::{Value, json};
use std::future::Future;
use tokio::net::TcpListener;

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(service)
}

async fn health(State(service): State<SignalingService>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "rooms": service.registry().room_count(),
        "connections": service.connection_count(),
    }))
}

/// Serves the relay on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: SignalingService,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    serve_app(listener, router(service), shutdown).await
}

/// Like `serve`, for a router that already carries extra layers.
pub async fn serve_app(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
