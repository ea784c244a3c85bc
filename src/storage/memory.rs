use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::ObjectStore;
use crate::error::{Error, Result};

/// An in-memory object store.
///
/// Clones share the same namespace, so several clients can race on one
/// store the way they would against a shared bucket. Reference
/// implementation of the [`ObjectStore`] contract and the workhorse of the
/// protocol tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_if_absent(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut objects = self.objects.lock()?;
        if objects.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_owned()));
        }
        objects.insert(name.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.lock()?;
        // BTreeMap iteration is already sorted ascending.
        Ok(objects
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let objects = self.objects.lock()?;
        objects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }
}
