use async_trait::async_trait;
use meshroom_client::{MeshError, MeshResult, SignalingTransport};
use meshroom_core::{RoomId, SignalingMessage};
use meshroom_relay::{RelayConnection, RelayHub};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct Link {
    connection: RelayConnection,
    inbound: mpsc::UnboundedSender<SignalingMessage>,
}

/// In-process signaling transport backed by a shared `RelayHub`.
///
/// One instance per simulated participant; all instances built from the
/// same hub see each other.
#[derive(Clone)]
pub struct MemoryTransport {
    hub: RelayHub,
    links: Arc<Mutex<HashMap<RoomId, Link>>>,
    available: Arc<AtomicBool>,
    published: Arc<Mutex<Vec<SignalingMessage>>>,
}

impl MemoryTransport {
    pub fn new(hub: &RelayHub) -> Self {
        Self {
            hub: hub.clone(),
            links: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// While unavailable every publish fails with `ChannelUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Delivers `message` to this participant as if the relay had sent it.
    pub fn inject(&self, room: &RoomId, message: SignalingMessage) {
        let links = self.links.lock().unwrap();
        if let Some(link) = links.get(room) {
            let _ = link.inbound.send(message);
        }
    }

    /// Drops the relay connection without a leave, like a dead socket.
    pub fn sever(&self, room: &RoomId) {
        self.links.lock().unwrap().remove(room);
    }

    /// Everything this participant successfully published, in order.
    pub fn published(&self) -> Vec<SignalingMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalingTransport for MemoryTransport {
    async fn publish(&self, room: &RoomId, message: SignalingMessage) -> MeshResult<()> {
        if !self.available.load(Ordering::Acquire) {
            return Err(MeshError::ChannelUnavailable("transport offline".into()));
        }

        let mut links = self.links.lock().unwrap();
        let Some(link) = links.get_mut(room) else {
            return Err(MeshError::ChannelUnavailable(format!(
                "not subscribed to {room}"
            )));
        };
        self.published.lock().unwrap().push(message.clone());
        link.connection.handle(message);
        Ok(())
    }

    async fn subscribe(
        &self,
        room: &RoomId,
    ) -> MeshResult<mpsc::UnboundedReceiver<SignalingMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = self.hub.connect(room.clone(), tx.clone());
        self.links.lock().unwrap().insert(
            room.clone(),
            Link {
                connection,
                inbound: tx,
            },
        );
        Ok(rx)
    }
}
