use meshroom_core::{ParticipantId, RosterEntry, SignalingMessage};
use tokio::sync::mpsc;
use tracing::debug;

pub(crate) type Outbox = mpsc::UnboundedSender<SignalingMessage>;

pub(crate) struct Member {
    entry: RosterEntry,
    connection: u64,
    /// `None` while the member's socket is gone and the grace timer runs.
    outbox: Option<Outbox>,
}

/// Members of one room, in join order.
#[derive(Default)]
pub(crate) struct RelayRoom {
    members: Vec<Member>,
}

impl RelayRoom {
    /// Registers `entry` on `connection`. Returns true when an existing
    /// member re-attached; it keeps its join position.
    pub(crate) fn attach(&mut self, entry: RosterEntry, connection: u64, outbox: Outbox) -> bool {
        if let Some(member) = self.members.iter_mut().find(|m| m.entry.id == entry.id) {
            member.entry.display_name = entry.display_name;
            member.connection = connection;
            member.outbox = Some(outbox);
            return true;
        }

        self.members.push(Member {
            entry,
            connection,
            outbox: Some(outbox),
        });
        false
    }

    pub(crate) fn remove(&mut self, id: ParticipantId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.entry.id != id);
        self.members.len() != before
    }

    /// Drops the outbox of `id` if it is still bound to `connection`.
    pub(crate) fn detach(&mut self, id: ParticipantId, connection: u64) -> bool {
        let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.entry.id == id && m.connection == connection)
        else {
            return false;
        };
        member.outbox = None;
        true
    }

    pub(crate) fn is_lapsed(&self, id: ParticipantId, connection: u64) -> bool {
        self.members
            .iter()
            .any(|m| m.entry.id == id && m.connection == connection && m.outbox.is_none())
    }

    pub(crate) fn snapshot(&self) -> Vec<RosterEntry> {
        self.members.iter().map(|m| m.entry.clone()).collect()
    }

    pub(crate) fn send_to(&self, id: ParticipantId, message: SignalingMessage) -> bool {
        let Some(outbox) = self
            .members
            .iter()
            .find(|m| m.entry.id == id)
            .and_then(|m| m.outbox.as_ref())
        else {
            debug!("No live connection for {}, dropping {}", id, message.kind_name());
            return false;
        };
        outbox.send(message).is_ok()
    }

    /// Sends `message` to every attached member except `except`.
    pub(crate) fn broadcast(&self, message: &SignalingMessage, except: Option<ParticipantId>) {
        for member in &self.members {
            if Some(member.entry.id) == except {
                continue;
            }
            if let Some(outbox) = &member.outbox {
                let _ = outbox.send(message.clone());
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
