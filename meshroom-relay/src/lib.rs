mod config;
mod hub;
mod server;

pub use config::*;
pub use hub::*;
pub use server::*;
