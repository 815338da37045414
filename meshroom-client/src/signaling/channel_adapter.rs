use crate::error::MeshResult;
use crate::signaling::SignalingTransport;
use meshroom_core::{RoomId, SignalingMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Thin typed boundary over the signaling transport for one room.
///
/// No retries and no deduplication happen here: a failed send is returned
/// to the caller, and duplicates are left to the idempotent consumers.
#[derive(Clone)]
pub struct ChannelAdapter {
    room: RoomId,
    transport: Arc<dyn SignalingTransport>,
}

impl ChannelAdapter {
    pub fn new(room: RoomId, transport: Arc<dyn SignalingTransport>) -> Self {
        Self { room, transport }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub async fn send(&self, message: SignalingMessage) -> MeshResult<()> {
        debug!("-> {} in room {}", message.kind_name(), self.room);
        self.transport.publish(&self.room, message).await
    }

    /// Ordered stream of inbound messages for this room.
    pub async fn subscribe(&self) -> MeshResult<mpsc::UnboundedReceiver<SignalingMessage>> {
        self.transport.subscribe(&self.room).await
    }

    /// Invoke `handler` once per inbound message, in delivery order, until
    /// the transport closes the stream.
    pub async fn on_message<F>(&self, mut handler: F) -> MeshResult<JoinHandle<()>>
    where
        F: FnMut(SignalingMessage) + Send + 'static,
    {
        let mut inbound = self.subscribe().await?;
        let room = self.room.clone();

        Ok(tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                handler(message);
            }
            warn!("Signaling stream for room {} ended", room);
        }))
    }
}
