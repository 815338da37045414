use std::fmt;

/// Lifecycle of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    New,
    Negotiating,
    Connected,
    Failed,
    Closed,
}

impl PeerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PeerState::Failed | PeerState::Closed)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::New => "new",
            PeerState::Negotiating => "negotiating",
            PeerState::Connected => "connected",
            PeerState::Failed => "failed",
            PeerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationRole {
    Initiator,
    Responder,
}

impl NegotiationRole {
    /// The participant that joined later sends the offer.
    pub fn for_pair(local_position: usize, remote_position: usize) -> Self {
        if local_position > remote_position {
            NegotiationRole::Initiator
        } else {
            NegotiationRole::Responder
        }
    }
}

/// Which asynchronous engine step, if any, the machine is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    Idle,
    CreatingOffer,
    ApplyingLocalOffer,
    AwaitingAnswer,
    ApplyingRemoteAnswer,
    ApplyingRemoteOffer,
    CreatingAnswer,
    ApplyingLocalAnswer,
    Stable,
}

impl NegotiationPhase {
    /// True while a locally generated offer is in flight or unanswered.
    pub fn has_outbound_offer(self) -> bool {
        matches!(
            self,
            NegotiationPhase::CreatingOffer
                | NegotiationPhase::ApplyingLocalOffer
                | NegotiationPhase::AwaitingAnswer
        )
    }
}
