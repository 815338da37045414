use meshroom_core::{ParticipantId, ParticipantIdError};
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the mesh session.
///
/// Per-peer variants never escape the coordinator as fatal: the affected
/// connection is torn down and the rest of the room keeps running.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("signaling channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("negotiation with {peer} failed: {reason}")]
    Negotiation { peer: ParticipantId, reason: String },

    #[error("negotiation with {peer} did not finish within {elapsed:?}")]
    NegotiationTimeout {
        peer: ParticipantId,
        elapsed: Duration,
    },

    #[error("{kind} from {peer} does not belong to any tracked peer")]
    RosterInconsistency {
        peer: ParticipantId,
        kind: &'static str,
    },

    #[error(transparent)]
    InvalidParticipantId(#[from] ParticipantIdError),

    #[error("failed to encode signaling message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("gesture inference failed: {0}")]
    Inference(String),

    #[error("mesh session is no longer running")]
    SessionClosed,
}

impl MeshError {
    pub fn negotiation(peer: ParticipantId, err: &anyhow::Error) -> Self {
        Self::Negotiation {
            peer,
            reason: format!("{err:#}"),
        }
    }
}

pub type MeshResult<T> = Result<T, MeshError>;
