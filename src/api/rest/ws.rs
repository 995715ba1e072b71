use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::models::user::Actor;
use crate::realtime::{InboundMessage, SessionHandle};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    actor: Option<Actor>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, actor))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, actor: Option<Actor>) {
    let SessionHandle { id, rx } = state.gateway.connect(actor);
    let (mut sender, mut receiver) = socket.split();
    let mut outbound = ReceiverStream::new(rx);

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.next().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    warn!(session_id = %id, error = %err, "failed to serialize realtime message");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let inbound_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match serde_json::from_str::<InboundMessage>(&text) {
                Ok(InboundMessage::DriverLocation(ping)) => {
                    inbound_state.gateway.relay_location(id, ping);
                    inbound_state.metrics.location_updates_total.inc();
                }
                Err(err) => {
                    warn!(session_id = %id, error = %err, "ignoring malformed realtime message");
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.gateway.disconnect(id);
}
