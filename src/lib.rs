//! A serverless table database.
//!
//! Durability and concurrency both come from an append-only log of
//! transaction manifests stored in an object store whose only mutation is
//! conditional create (put-if-absent). Clients begin a transaction by
//! folding the log into a snapshot, buffer writes in memory, seal full
//! buffers into immutable data objects, and commit by claiming the next
//! log name. Exactly one of two racing committers wins the name; the other
//! observes a commit conflict and its sealed objects are left orphaned and
//! unreachable.

pub mod config;
pub mod dataobject;
pub mod db;
pub mod encoding;
pub mod error;
pub mod manifest;
pub mod scan;
pub mod storage;
pub mod txn;
pub mod value;

pub use config::StoreConfig;
pub use dataobject::{DataObject, DATAOBJECT_SIZE};
pub use db::Database;
pub use error::{Error, Result};
pub use scan::ScanIter;
pub use storage::{FileObjectStore, MemoryObjectStore, ObjectStore};
pub use value::{Row, Value};
