mod relay_connection;
mod relay_hub;
mod relay_room;

pub use relay_connection::*;
pub use relay_hub::*;
