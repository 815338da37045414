pub use meshroom_core::model::{ParticipantId, RoomId};

pub mod model {
    pub use meshroom_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshroom_client::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use meshroom_relay::*;
}
