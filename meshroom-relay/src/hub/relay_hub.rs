use crate::config::RelayConfig;
use crate::hub::RelayConnection;
use crate::hub::relay_room::{Outbox, RelayRoom};
use dashmap::DashMap;
use meshroom_core::{ParticipantId, RoomId, RosterEntry, SignalingMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

struct HubInner {
    rooms: DashMap<RoomId, RelayRoom>,
    config: RelayConfig,
    next_connection: AtomicU64,
}

/// Room-scoped pub/sub for signaling messages.
///
/// Transport agnostic: the WebSocket handler and in-process callers both
/// talk to it through `RelayConnection`s. Rooms exist while they have
/// members and are dropped when the last one leaves.
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<HubInner>,
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

impl RelayHub {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                rooms: DashMap::new(),
                config,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Opens a connection to `room`. Messages for it are pushed to `outbox`.
    pub fn connect(
        &self,
        room: RoomId,
        outbox: mpsc::UnboundedSender<SignalingMessage>,
    ) -> RelayConnection {
        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        debug!("Connection {} opened for room {}", id, room);
        RelayConnection::new(self.clone(), room, id, outbox)
    }

    /// Members of `room` in join order, lapsed ones included.
    pub fn members(&self, room: &RoomId) -> Vec<RosterEntry> {
        self.inner
            .rooms
            .get(room)
            .map(|r| r.snapshot())
            .unwrap_or_default()
    }

    pub fn has_room(&self, room: &RoomId) -> bool {
        self.inner.rooms.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub(crate) fn join(&self, room: &RoomId, entry: RosterEntry, connection: u64, outbox: Outbox) {
        let id = entry.id;
        let join = SignalingMessage::Join {
            sender: id,
            display_name: entry.display_name.clone(),
        };

        let mut state = self.inner.rooms.entry(room.clone()).or_default();
        let reattached = state.attach(entry, connection, outbox);
        let participants = state.snapshot();
        let count = participants.len();

        state.send_to(id, SignalingMessage::RosterSnapshot { participants });
        state.broadcast(&join, Some(id));
        drop(state);

        if reattached {
            info!("{} re-attached to room {}", id, room);
        } else {
            info!("{} joined room {} ({} members)", id, room, count);
        }
    }

    pub(crate) fn leave(&self, room: &RoomId, id: ParticipantId) {
        let remaining = self.inner.rooms.get_mut(room).and_then(|mut state| {
            if !state.remove(id) {
                return None;
            }
            state.broadcast(&SignalingMessage::Leave { sender: id }, None);
            Some(state.len())
        });

        if let Some(remaining) = remaining {
            info!("{} left room {} ({} remaining)", id, room, remaining);
        }
        self.remove_if_empty(room);
    }

    pub(crate) fn route(&self, room: &RoomId, target: ParticipantId, message: SignalingMessage) {
        if let Some(state) = self.inner.rooms.get(room) {
            state.send_to(target, message);
        }
    }

    pub(crate) fn broadcast(&self, room: &RoomId, message: SignalingMessage) {
        if let Some(state) = self.inner.rooms.get(room) {
            state.broadcast(&message, None);
        }
    }

    /// The socket behind `connection` is gone. Unless `id` re-attaches
    /// within the grace period, the room is told it left.
    pub(crate) fn disconnect(&self, room: &RoomId, id: ParticipantId, connection: u64) {
        let detached = self
            .inner
            .rooms
            .get_mut(room)
            .is_some_and(|mut state| state.detach(id, connection));
        if !detached {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.expire(room, id, connection);
            return;
        };

        debug!("{} lost its connection to room {}", id, room);
        let hub = self.clone();
        let room = room.clone();
        let grace = self.inner.config.presence_grace;
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            hub.expire(&room, id, connection);
        });
    }

    fn expire(&self, room: &RoomId, id: ParticipantId, connection: u64) {
        let lapsed = self
            .inner
            .rooms
            .get(room)
            .is_some_and(|state| state.is_lapsed(id, connection));
        if lapsed {
            info!("Presence of {} in room {} lapsed", id, room);
            self.leave(room, id);
        }
    }

    fn remove_if_empty(&self, room: &RoomId) {
        if self
            .inner
            .rooms
            .remove_if(room, |_, state| state.is_empty())
            .is_some()
        {
            info!("Room {} is empty, removing", room);
        }
    }
}
