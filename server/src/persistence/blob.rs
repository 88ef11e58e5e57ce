//! Binary encoding of the structured sub-records kept on a player row.
//!
//! Each record type goes through one encode/decode pair so the storage
//! format never leaks into handler code.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::world::{Cloth, NonoInfo, TaskState, TeamInfo};

/// A sub-record stored as an opaque blob
pub trait Blob: Serialize + DeserializeOwned + Default {
    fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// An empty blob decodes to the default record
    fn decode(raw: &[u8]) -> Result<Self, bincode::Error> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        bincode::deserialize(raw)
    }
}

impl Blob for NonoInfo {}
impl Blob for TeamInfo {}
impl Blob for TaskState {}
impl Blob for Vec<Cloth> {}
