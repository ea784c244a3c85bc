use std::vec::IntoIter;

use crate::dataobject::{data_object_key, DataObject};
use crate::error::Result;
use crate::storage::ObjectStore;
use crate::value::Row;

/// A lazy, single-pass scan over one table's rows.
///
/// Construction captures the transaction's view at call time: a by-value
/// snapshot of the unflushed buffer and the ordered list of durable data
/// object names (snapshot objects first, then objects flushed by the
/// transaction itself). Writes made to the transaction afterwards are not
/// seen by an already-constructed iterator.
///
/// Unflushed rows are yielded first, then each data object's rows
/// `[0, len)` in object order. Objects are read and decoded on first
/// access; a read or decode failure is yielded once as an error, after
/// which the iterator is exhausted. Not restartable.
pub struct ScanIter<'a, S: ObjectStore> {
    store: &'a S,
    table: String,
    unflushed: IntoIter<Row>,
    objects: IntoIter<String>,
    current: Option<IntoIter<Row>>,
    done: bool,
}

impl<'a, S: ObjectStore> ScanIter<'a, S> {
    pub(crate) fn new(
        store: &'a S,
        table: impl Into<String>,
        objects: Vec<String>,
        unflushed: Vec<Row>,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            unflushed: unflushed.into_iter(),
            objects: objects.into_iter(),
            current: None,
            done: false,
        }
    }

    /// Reads and decodes the named data object, keeping only its valid
    /// row prefix.
    fn load(&self, name: &str) -> Result<DataObject> {
        let bytes = self.store.read(&data_object_key(&self.table, name))?;
        DataObject::decode(&bytes)
    }
}

impl<S: ObjectStore> Iterator for ScanIter<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(row) = self.unflushed.next() {
            return Some(Ok(row));
        }

        loop {
            if let Some(rows) = &mut self.current {
                if let Some(row) = rows.next() {
                    return Some(Ok(row));
                }
                self.current = None;
            }

            let Some(name) = self.objects.next() else {
                self.done = true;
                return None;
            };

            match self.load(&name) {
                Ok(object) => self.current = Some(object.rows.into_iter()),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
