mod participant;
mod room;
mod session;
mod signaling;
mod text;

pub use participant::{ParticipantId, ParticipantIdError};
pub use room::RoomId;
pub use session::{IceCandidate, SdpKind, SessionDescription};
pub use signaling::{RosterEntry, SignalingMessage};
pub use text::TextKind;
