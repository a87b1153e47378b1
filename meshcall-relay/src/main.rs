use anyhow::{Context, Result};
use clap::Parser;
use meshcall::model::IceServerConfig;
use meshcall::model::utils::{DEFAULT_STUN_ADDR, DEFAULT_RELAY_PORT};
use meshcall::server::{RelayConfig, SignalingService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meshcall-relay")]
#[command(about = "Room presence and signaling relay for mesh calls")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "MESHCALL_BIND", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_RELAY_PORT)))]
    bind: SocketAddr,

    /// STUN servers advertised to clients
    #[arg(long = "stun", default_value = DEFAULT_STUN_ADDR)]
    stun: Vec<String>,

    #[arg(long, env = "TURN_URL")]
    turn_url: Option<String>,

    #[arg(long, env = "TURN_USERNAME")]
    turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL", hide_env_values = true)]
    turn_credential: Option<String>,

    /// Chat messages kept per room
    #[arg(long, default_value_t = 500)]
    chat_history: usize,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        let mut ice_servers: Vec<IceServerConfig> = self
            .stun
            .iter()
            .filter(|url| !url.trim().is_empty())
            .map(|url| IceServerConfig::stun(url.clone()))
            .collect();

        match &self.turn_url {
            Some(url) => ice_servers.push(IceServerConfig {
                urls: vec![url.clone()],
                username: self.turn_username.clone(),
                credential: self.turn_credential.clone(),
            }),
            None if self.turn_username.is_some() || self.turn_credential.is_some() => {
                warn!("TURN credentials given without TURN_URL; ignoring them");
            }
            None => {}
        }

        RelayConfig {
            bind: self.bind,
            ice_servers,
            chat_history_limit: self.chat_history,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.relay_config();
    info!(
        "Advertising {} ICE server(s), keeping {} chat messages per room",
        config.ice_servers.len(),
        config.chat_history_limit
    );

    let service = SignalingService::new(&config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = meshcall::server::router(service).layer(cors);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Signaling relay listening on ws://{}/ws", config.bind);

    meshcall::server::serve_app(listener, app, shutdown_signal()).await?;
    Ok(())
}
