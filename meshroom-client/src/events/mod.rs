mod event_bus;
mod gesture;

pub use event_bus::*;
pub use gesture::*;
