use crate::events::TextEvent;
use crate::peer::{NegotiationRole, PeerState};
use meshroom_core::ParticipantId;

/// Notifications for UI-side consumers of a mesh session.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    ParticipantJoined {
        id: ParticipantId,
        display_name: String,
    },
    ParticipantLeft {
        id: ParticipantId,
    },
    PeerStateChanged {
        id: ParticipantId,
        state: PeerState,
    },
    TrackAdded {
        id: ParticipantId,
        kind: String,
        track_id: String,
    },
    Text(TextEvent),
    /// A signaling send failed; the affected negotiation will be retried.
    SignalingUnavailable {
        reason: String,
    },
    /// The session stopped (leave, or every handle dropped).
    Ended,
}

/// Read-only view of one live peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub id: ParticipantId,
    pub role: NegotiationRole,
    pub state: PeerState,
}
