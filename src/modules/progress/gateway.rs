use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::broadcaster::ProgressBroadcaster;
use super::events::WsFrame;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub client_id: Option<String>,
}

/// Subscribe to progress events for one client id
#[utoipa::path(
    get,
    path = "/ws",
    params(
        ("client_id" = Option<String>, Query, description = "Client id used when submitting jobs; generated when absent")
    ),
    responses(
        (status = 101, description = "Switching to WebSocket")
    ),
    tag = "Progress"
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    let client_id = params
        .client_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster, client_id))
}

async fn handle_socket(socket: WebSocket, broadcaster: ProgressBroadcaster, client_id: String) {
    let mut connection = broadcaster.on_connect(&client_id);
    let (mut sender, mut receiver) = socket.split();

    info!(
        client_id = %client_id,
        clients = broadcaster.connected_clients(),
        "✅ Client connected"
    );

    if send_frame(&mut sender, &WsFrame::connected(&client_id)).await {
        loop {
            tokio::select! {
                event = connection.events.recv() => match event {
                    Some(event) => {
                        if !send_frame(&mut sender, &WsFrame::UploadProgress(event)).await {
                            break;
                        }
                    }
                    // Replaced by a newer connection under the same id.
                    None => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    broadcaster.on_disconnect(&connection.client_id, connection.connection_id);
    info!(client_id = %connection.client_id, "❌ Client disconnected");
}

async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &WsFrame) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize frame: {}", e);
            return true;
        }
    };

    match sender.send(Message::Text(json.into())).await {
        Ok(()) => true,
        Err(e) => {
            debug!("WebSocket send failed: {}", e);
            false
        }
    }
}
