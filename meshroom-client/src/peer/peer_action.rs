use meshroom_core::{IceCandidate, SessionDescription, SignalingMessage};

/// Side effect requested by a `PeerMachine` transition.
///
/// Engine actions are queued to the peer's worker and executed strictly in
/// the order they were emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAction {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SessionDescription),
    SetRemoteDescription(SessionDescription),
    AddIceCandidate(IceCandidate),
    Signal(SignalingMessage),
    /// Discard this machine and accept `offer` on a fresh responder.
    Restart { offer: String },
}

/// Result of a periodic timeout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutVerdict {
    Pending,
    Expired,
    /// A responder never received an offer; it should initiate instead.
    Promote,
}
