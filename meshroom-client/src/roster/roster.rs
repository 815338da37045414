use crate::roster::RosterChange;
use meshroom_core::{ParticipantId, RosterEntry};

/// Local view of who is in the room, in join order.
///
/// Only the mesh coordinator mutates it; everyone else gets owned snapshots.
#[derive(Debug, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` at the end of the join order. A known id only gets its
    /// display name refreshed and yields an empty change.
    pub fn apply_join(&mut self, id: ParticipantId, display_name: &str) -> RosterChange {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            if entry.display_name != display_name {
                entry.display_name = display_name.to_owned();
            }
            return RosterChange::default();
        }

        self.entries.push(RosterEntry::new(id, display_name));
        RosterChange {
            added: vec![id],
            removed: Vec::new(),
        }
    }

    pub fn apply_leave(&mut self, id: ParticipantId) -> RosterChange {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);

        if self.entries.len() == before {
            return RosterChange::default();
        }
        RosterChange {
            added: Vec::new(),
            removed: vec![id],
        }
    }

    /// Replaces the membership with an authoritative snapshot. Entries keep
    /// the snapshot's order; `keep` is retained (appended last) even when the
    /// snapshot omits it.
    pub fn apply_snapshot(&mut self, snapshot: &[RosterEntry], keep: &RosterEntry) -> RosterChange {
        let mut next: Vec<RosterEntry> = Vec::with_capacity(snapshot.len() + 1);
        for entry in snapshot {
            if !next.iter().any(|e| e.id == entry.id) {
                next.push(entry.clone());
            }
        }
        if !next.iter().any(|e| e.id == keep.id) {
            next.push(keep.clone());
        }

        let added = next
            .iter()
            .filter(|e| !self.contains(e.id))
            .map(|e| e.id)
            .collect();
        let removed = self
            .entries
            .iter()
            .filter(|e| !next.iter().any(|n| n.id == e.id))
            .map(|e| e.id)
            .collect();

        self.entries = next;
        RosterChange { added, removed }
    }

    pub fn current(&self) -> Vec<RosterEntry> {
        self.entries.clone()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Zero-based join position.
    pub fn position(&self, id: ParticipantId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn display_name(&self, id: ParticipantId) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.display_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> RosterChange {
        let removed = self.entries.drain(..).map(|e| e.id).collect();
        RosterChange {
            added: Vec::new(),
            removed,
        }
    }
}
