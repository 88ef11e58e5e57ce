//! Protocol definitions shared by the Seer listeners and their tooling.

pub mod body;
pub mod commands;
pub mod protocol;

pub use body::{BodyReader, BodyWriter};
pub use protocol::*;
