//! World model: sessions, connection bindings and map membership.

mod session;
mod state;

pub use session::{unix_now, Cloth, ItemStack, NonoInfo, Pet, Session, Spawn, TaskState, TeamInfo, MAX_DV};
pub use state::WorldState;
