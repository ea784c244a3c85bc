use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Key prefix shared by all committed manifests.
pub const LOG_PREFIX: &str = "_log_";

/// One atomic contribution of a transaction to the log.
///
/// Exactly one variant applies; the serde tag is the wire tag, so a
/// manifest written by one client decodes unambiguously in another. An
/// unrecognized tag fails decoding, which the client treats as a corrupt
/// log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// A sealed data object became part of the table.
    AddDataObject { table: String, name: String },
    /// The table's column metadata was set.
    ChangeMetadata { table: String, columns: Vec<String> },
}

/// The serialized record of a committed transaction, stored at a `_log_*`
/// key.
///
/// This is the persisted projection of a transaction: its id, the actions
/// it performed per table, and the table metadata it observed. Snapshot
/// state and unflushed buffers never reach disk. Maps are ordered so the
/// encoding is deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: u64,
    #[serde(rename = "Actions")]
    pub actions: BTreeMap<String, Vec<Action>>,
    pub tables: BTreeMap<String, Vec<String>>,
}

/// Builds the store key `_log_<20-digit zero-padded id>` for a manifest.
///
/// Zero padding makes bytewise name order equal numeric id order, which is
/// what lets list_prefix stand in for a sequence scan.
pub fn log_key(id: u64) -> String {
    format!("{LOG_PREFIX}{id:020}")
}

/// Parses the id out of a `_log_*` key. A name under the log prefix that
/// does not carry a decimal id means the log itself is damaged.
pub fn parse_log_id(name: &str) -> Result<u64> {
    let Some(id) = name.strip_prefix(LOG_PREFIX) else {
        return Err(Error::CorruptLog(format!("malformed log name {name}")));
    };
    id.parse()
        .map_err(|_| Error::CorruptLog(format!("malformed log id in {name}")))
}
