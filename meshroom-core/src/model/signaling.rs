use crate::model::participant::ParticipantId;
use crate::model::session::IceCandidate;
use crate::model::text::TextKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: ParticipantId,
    pub display_name: String,
}

impl RosterEntry {
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Everything that travels over the room-scoped signaling channel.
///
/// Offer, answer and candidate messages are directed: they name a `target`
/// and every other receiver ignores them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum SignalingMessage {
    Join {
        sender: ParticipantId,
        display_name: String,
    },
    /// Current membership in join order, sent to a participant that just joined.
    RosterSnapshot {
        participants: Vec<RosterEntry>,
    },
    Leave {
        sender: ParticipantId,
    },
    Offer {
        sender: ParticipantId,
        target: ParticipantId,
        sdp: String,
    },
    Answer {
        sender: ParticipantId,
        target: ParticipantId,
        sdp: String,
    },
    IceCandidate {
        sender: ParticipantId,
        target: ParticipantId,
        candidate: IceCandidate,
    },
    TextMessage {
        sender: ParticipantId,
        display_name: String,
        kind: TextKind,
        body: String,
    },
}

impl SignalingMessage {
    pub fn sender(&self) -> Option<ParticipantId> {
        match self {
            SignalingMessage::RosterSnapshot { .. } => None,
            SignalingMessage::Join { sender, .. }
            | SignalingMessage::Leave { sender }
            | SignalingMessage::Offer { sender, .. }
            | SignalingMessage::Answer { sender, .. }
            | SignalingMessage::IceCandidate { sender, .. }
            | SignalingMessage::TextMessage { sender, .. } => Some(*sender),
        }
    }

    pub fn target(&self) -> Option<ParticipantId> {
        match self {
            SignalingMessage::Offer { target, .. }
            | SignalingMessage::Answer { target, .. }
            | SignalingMessage::IceCandidate { target, .. } => Some(*target),
            SignalingMessage::Join { .. }
            | SignalingMessage::RosterSnapshot { .. }
            | SignalingMessage::Leave { .. }
            | SignalingMessage::TextMessage { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SignalingMessage::Join { .. } => "join",
            SignalingMessage::RosterSnapshot { .. } => "roster_snapshot",
            SignalingMessage::Leave { .. } => "leave",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "ice_candidate",
            SignalingMessage::TextMessage { .. } => "text_message",
        }
    }
}
