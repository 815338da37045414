use crate::error::MeshResult;
use crate::signaling::ChannelAdapter;
use meshroom_core::{ParticipantId, RosterEntry, SignalingMessage, TextKind};
use tokio::sync::broadcast;
use tracing::debug;

/// Text received over the side channel, chat or gesture-derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub sender: ParticipantId,
    pub display_name: String,
    pub kind: TextKind,
    pub body: String,
}

/// Room-wide text messages riding on the signaling channel.
///
/// Pass-through only: nothing is stored, filtered or acknowledged.
#[derive(Clone)]
pub struct SideChannelBus {
    local: RosterEntry,
    adapter: ChannelAdapter,
    listeners: broadcast::Sender<TextEvent>,
}

impl SideChannelBus {
    pub fn new(local: RosterEntry, adapter: ChannelAdapter, capacity: usize) -> Self {
        let (listeners, _) = broadcast::channel(capacity.max(1));
        Self {
            local,
            adapter,
            listeners,
        }
    }

    pub async fn broadcast_text(&self, kind: TextKind, body: impl Into<String>) -> MeshResult<()> {
        self.adapter
            .send(SignalingMessage::TextMessage {
                sender: self.local.id,
                display_name: self.local.display_name.clone(),
                kind,
                body: body.into(),
            })
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TextEvent> {
        self.listeners.subscribe()
    }

    /// Fan an inbound text out to every current subscriber.
    pub fn dispatch(&self, event: TextEvent) {
        if self.listeners.send(event).is_err() {
            debug!("No text listeners in room {}", self.adapter.room());
        }
    }
}
