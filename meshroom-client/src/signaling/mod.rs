mod channel_adapter;
mod signaling_transport;
mod ws_transport;

pub use channel_adapter::*;
pub use signaling_transport::*;
pub use ws_transport::*;
