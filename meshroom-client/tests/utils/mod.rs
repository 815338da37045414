pub mod memory_transport;
pub mod mesh_helpers;

pub use memory_transport::*;
pub use mesh_helpers::*;
pub use mock_engine::*;
