use crate::error::{MeshError, MeshResult};
use crate::events::SideChannelBus;
use crate::mesh::{MeshCommand, MeshEvent, PeerSnapshot};
use meshroom_core::{ParticipantId, RoomId, RosterEntry, TextKind};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Caller-side handle to a running mesh session.
///
/// Cloneable; the session leaves the room on `leave_room` or once every
/// clone has been dropped.
#[derive(Clone)]
pub struct MeshHandle {
    local: RosterEntry,
    room: RoomId,
    commands: mpsc::Sender<MeshCommand>,
    events: broadcast::Sender<MeshEvent>,
    bus: SideChannelBus,
}

impl MeshHandle {
    pub(crate) fn new(
        local: RosterEntry,
        room: RoomId,
        commands: mpsc::Sender<MeshCommand>,
        events: broadcast::Sender<MeshEvent>,
        bus: SideChannelBus,
    ) -> Self {
        Self {
            local,
            room,
            commands,
            events,
            bus,
        }
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.local.id
    }

    pub fn display_name(&self) -> &str {
        &self.local.display_name
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.events.subscribe()
    }

    /// Live peer connections, in join order.
    pub async fn peers(&self) -> MeshResult<Vec<PeerSnapshot>> {
        self.request(|reply| MeshCommand::Peers { reply }).await
    }

    /// Current roster including the local participant.
    pub async fn roster(&self) -> MeshResult<Vec<RosterEntry>> {
        self.request(|reply| MeshCommand::Roster { reply }).await
    }

    pub fn bus(&self) -> &SideChannelBus {
        &self.bus
    }

    pub async fn send_chat(&self, body: impl Into<String>) -> MeshResult<()> {
        self.bus.broadcast_text(TextKind::Chat, body).await
    }

    /// Announces departure, closes every peer connection and stops the session.
    pub async fn leave_room(self) -> MeshResult<()> {
        self.request(|reply| MeshCommand::Leave { reply }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> MeshCommand,
    ) -> MeshResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| MeshError::SessionClosed)?;
        rx.await.map_err(|_| MeshError::SessionClosed)
    }
}
