use meshroom_core::ParticipantId;

/// Structural difference produced by one roster mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterChange {
    pub added: Vec<ParticipantId>,
    pub removed: Vec<ParticipantId>,
}

impl RosterChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
