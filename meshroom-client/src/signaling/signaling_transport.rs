use crate::error::MeshResult;
use async_trait::async_trait;
use meshroom_core::{RoomId, SignalingMessage};
use tokio::sync::mpsc;

/// Room-scoped publish/subscribe bus supplied by the environment.
///
/// Delivery is ordered per sender and at-least-once; nothing else is assumed.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Publish a message to the room. Fails with `ChannelUnavailable` when
    /// the transport is disconnected.
    async fn publish(&self, room: &RoomId, message: SignalingMessage) -> MeshResult<()>;

    /// Start receiving the room's messages, in transport delivery order.
    async fn subscribe(&self, room: &RoomId)
    -> MeshResult<mpsc::UnboundedReceiver<SignalingMessage>>;
}
