use crate::hub::RelayHub;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use meshroom_core::{RoomId, SignalingMessage};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(hub): State<RelayHub>,
) -> impl IntoResponse {
    let room = RoomId::from(room);

    ws.on_upgrade(move |socket| handle_socket(socket, room, hub))
}

async fn handle_socket(socket: WebSocket, room: RoomId, hub: RelayHub) {
    info!("New WebSocket connection for room {}", room);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SignalingMessage>();

    let mut connection = hub.connect(room.clone(), tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize signaling message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(msg)) = frame else { break };
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalingMessage>(&text) {
                        Ok(signal) => connection.handle(signal),
                        Err(e) => warn!("Invalid signaling message in room {}: {:?}", room, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    let participant = connection.participant();
    drop(connection);
    info!("WebSocket for {:?} in room {} disconnected", participant, room);
}
