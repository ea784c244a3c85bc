use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Serialize a value as JSON.
pub fn serialize<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("serialization should not fail")
}

/// Deserialize a value from a JSON byte slice.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
