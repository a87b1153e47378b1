use crate::registry::ConnectionId;
use crate::signaling::SignalingService;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use meshcall_core::{Member, ServerMessage};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    let connection = ConnectionId::new();
    let member = SignalingService::identify(connection, params.token.as_deref());

    ws.on_upgrade(move |socket| handle_socket(socket, connection, member, service))
}

async fn handle_socket(
    socket: WebSocket,
    connection: ConnectionId,
    member: Member,
    service: SignalingService,
) {
    info!("New WebSocket connection: {} as {}", connection, member.user_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    service.add_peer(connection, member, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => service.handle_text(connection, text.as_str()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.remove_peer(connection);
    info!("WebSocket disconnected: {}", connection);
}
