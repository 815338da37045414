mod peer_action;
mod peer_machine;
mod peer_state;

pub use peer_action::*;
pub use peer_machine::*;
pub use peer_state::*;
