use crate::error::{MeshError, MeshResult};
use crate::signaling::SignalingTransport;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use meshroom_core::{RoomId, SignalingMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

struct RoomLink {
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

/// WebSocket client for the meshroom relay (`{base_url}/ws/{room}`).
///
/// One socket per subscribed room. Once a socket drops, publishing to that
/// room fails with `ChannelUnavailable` until it is subscribed again.
#[derive(Clone)]
pub struct WsTransport {
    base_url: String,
    links: Arc<DashMap<RoomId, RoomLink>>,
}

impl WsTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            links: Arc::new(DashMap::new()),
        }
    }

    pub fn room_url(&self, room: &RoomId) -> String {
        format!("{}/ws/{}", self.base_url, room)
    }

    pub fn is_connected(&self, room: &RoomId) -> bool {
        self.links
            .get(room)
            .is_some_and(|link| link.connected.load(Ordering::Acquire))
    }
}

#[async_trait]
impl SignalingTransport for WsTransport {
    async fn publish(&self, room: &RoomId, message: SignalingMessage) -> MeshResult<()> {
        let Some(link) = self.links.get(room) else {
            return Err(MeshError::ChannelUnavailable(format!(
                "not subscribed to room {room}"
            )));
        };
        if !link.connected.load(Ordering::Acquire) {
            return Err(MeshError::ChannelUnavailable(format!(
                "socket for room {room} is closed"
            )));
        }

        let json = serde_json::to_string(&message)?;
        link.outbound
            .send(json)
            .map_err(|_| MeshError::ChannelUnavailable(format!("writer for room {room} stopped")))
    }

    async fn subscribe(
        &self,
        room: &RoomId,
    ) -> MeshResult<mpsc::UnboundedReceiver<SignalingMessage>> {
        let url = self.room_url(room);
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| MeshError::ChannelUnavailable(format!("connect {url}: {e}")))?;
        info!("Connected to signaling relay at {}", url);

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        let writer_connected = connected.clone();
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    error!("Failed to write to signaling socket: {}", e);
                    break;
                }
            }
            writer_connected.store(false, Ordering::Release);
            let _ = sink.close().await;
        });

        let reader_connected = connected.clone();
        let reader_room = room.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<SignalingMessage>(&text) {
                            Ok(message) => {
                                if inbound_tx.send(message).is_err() {
                                    debug!("Inbound consumer for room {} is gone", reader_room);
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid signaling frame in {}: {}", reader_room, e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling socket for {} failed: {}", reader_room, e);
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::Release);
            info!("Signaling socket for room {} closed", reader_room);
        });

        self.links.insert(
            room.clone(),
            RoomLink {
                outbound: outbound_tx,
                connected,
            },
        );

        Ok(inbound_rx)
    }
}
