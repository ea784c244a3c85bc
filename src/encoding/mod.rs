pub mod json;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Trait for objects persisted in the object store.
///
/// Manifests and data objects are encoded with a self-describing text
/// format so any client can fold the log without a schema registry.
pub trait Object: Serialize + DeserializeOwned {
    /// Encode the object to bytes.
    fn encode(&self) -> Vec<u8> {
        json::serialize(self)
    }

    /// Decode bytes back to the original object type.
    fn decode(bytes: &[u8]) -> Result<Self> {
        json::deserialize(bytes)
    }
}

impl<T> Object for T where T: Serialize + DeserializeOwned {}
