//! Error types for the Horizon protocol layer.

mod channel;
mod protocol;
mod store;

pub use channel::*;
pub use protocol::*;
pub use store::*;
