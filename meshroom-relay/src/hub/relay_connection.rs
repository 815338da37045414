use crate::hub::RelayHub;
use crate::hub::relay_room::Outbox;
use meshroom_core::{ParticipantId, RoomId, RosterEntry, SignalingMessage};
use tracing::warn;

/// One client's attachment to a room on the hub.
///
/// Binds to a participant id with its first `Join`; later messages must
/// carry that id as sender. Dropping the connection without a `Leave`
/// starts the presence grace period.
pub struct RelayConnection {
    hub: RelayHub,
    room: RoomId,
    id: u64,
    outbox: Outbox,
    participant: Option<ParticipantId>,
}

impl RelayConnection {
    pub(crate) fn new(hub: RelayHub, room: RoomId, id: u64, outbox: Outbox) -> Self {
        Self {
            hub,
            room,
            id,
            outbox,
            participant: None,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn participant(&self) -> Option<ParticipantId> {
        self.participant
    }

    pub fn handle(&mut self, message: SignalingMessage) {
        match message {
            SignalingMessage::Join {
                sender,
                display_name,
            } => {
                if let Some(bound) = self.participant
                    && bound != sender
                {
                    warn!(
                        "Connection {} already joined as {}, ignoring join as {}",
                        self.id, bound, sender
                    );
                    return;
                }
                self.participant = Some(sender);
                self.hub.join(
                    &self.room,
                    RosterEntry::new(sender, display_name),
                    self.id,
                    self.outbox.clone(),
                );
            }

            SignalingMessage::RosterSnapshot { .. } => {
                warn!("Ignoring roster snapshot sent by connection {}", self.id);
            }

            message => {
                let Some(bound) = self.participant else {
                    warn!(
                        "Dropping {} from connection {} before join",
                        message.kind_name(),
                        self.id
                    );
                    return;
                };
                if message.sender() != Some(bound) {
                    warn!(
                        "Dropping {} with foreign sender on connection {}",
                        message.kind_name(),
                        self.id
                    );
                    return;
                }

                if let SignalingMessage::Leave { sender } = message {
                    self.participant = None;
                    self.hub.leave(&self.room, sender);
                    return;
                }

                match message.target() {
                    Some(target) => self.hub.route(&self.room, target, message),
                    None => self.hub.broadcast(&self.room, message),
                }
            }
        }
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        if let Some(participant) = self.participant.take() {
            self.hub.disconnect(&self.room, participant, self.id);
        }
    }
}
