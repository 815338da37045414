mod config;
mod error;
mod events;
mod mesh;
mod peer;
mod roster;
mod signaling;
mod transport;

pub use config::*;
pub use error::*;
pub use events::*;
pub use mesh::*;
pub use peer::*;
pub use roster::*;
pub use signaling::*;
pub use transport::*;
