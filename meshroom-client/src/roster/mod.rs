mod roster;
mod roster_change;

pub use roster::*;
pub use roster_change::*;
