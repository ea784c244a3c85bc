use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errdata;
use crate::error::Result;
use crate::value::Row;

/// Maximum number of rows in a single data object. The wire form always
/// encodes this many slots, so the constant is part of the format, not a
/// tunable.
pub const DATAOBJECT_SIZE: usize = 65_536;

/// Key prefix shared by all data objects.
pub const TABLE_PREFIX: &str = "_table_";

/// An immutable, fixed-capacity batch of rows belonging to one table.
///
/// The wire form encodes `Data` as exactly [`DATAOBJECT_SIZE`] slots: the
/// first `Len` hold rows, the rest are null and must not be read. Names are
/// freshly generated UUIDv4s, so a data object key never collides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    #[serde(rename = "Table")]
    pub table: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Data", with = "padded")]
    pub rows: Vec<Row>,
    #[serde(rename = "Len")]
    pub len: usize,
}

impl DataObject {
    /// Seals the given rows into a new data object with a fresh name.
    pub fn seal(table: impl Into<String>, rows: Vec<Row>) -> Self {
        let len = rows.len();
        Self {
            table: table.into(),
            name: Uuid::new_v4().to_string(),
            rows,
            len,
        }
    }

    /// Decodes a data object, keeping only the `Len`-bounded row prefix.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut object: DataObject = crate::encoding::json::deserialize(bytes)?;
        if object.len > DATAOBJECT_SIZE {
            return errdata!("data object {} length {} exceeds capacity", object.name, object.len);
        }
        if object.rows.len() < object.len {
            return errdata!(
                "data object {} holds {} rows but declares length {}",
                object.name,
                object.rows.len(),
                object.len
            );
        }
        // Slots past Len are undefined; drop them.
        object.rows.truncate(object.len);
        Ok(object)
    }

    /// The store key for this object.
    pub fn key(&self) -> String {
        data_object_key(&self.table, &self.name)
    }
}

/// Builds the store key `_table_<table>_<name>` for a data object.
pub fn data_object_key(table: &str, name: &str) -> String {
    format!("{TABLE_PREFIX}{table}_{name}")
}

/// Wire form of the row slots: always a full-capacity array, null-padded
/// past the valid prefix.
mod padded {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATAOBJECT_SIZE;
    use crate::value::Row;

    pub fn serialize<S: Serializer>(rows: &[Row], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(DATAOBJECT_SIZE))?;
        for row in rows {
            seq.serialize_element(row)?;
        }
        for _ in rows.len()..DATAOBJECT_SIZE {
            seq.serialize_element(&())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Row>, D::Error> {
        let slots: Vec<Option<Row>> = Vec::deserialize(deserializer)?;
        Ok(slots.into_iter().flatten().collect())
    }
}
