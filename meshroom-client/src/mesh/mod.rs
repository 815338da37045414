mod coordinator;
mod mesh_client;
mod mesh_command;
mod mesh_event;
mod mesh_handle;
mod peer_worker;

pub use mesh_client::*;
pub use mesh_command::*;
pub use mesh_event::*;
pub use mesh_handle::*;
