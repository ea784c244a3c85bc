use crate::dataobject::{DataObject, DATAOBJECT_SIZE};
use crate::encoding::Object;
use crate::errinput;
use crate::error::{Error, Result};
use crate::manifest::{log_key, parse_log_id, Manifest, LOG_PREFIX};
use crate::scan::ScanIter;
use crate::storage::ObjectStore;
use crate::txn::Transaction;
use crate::value::Row;

/// A database client: one object store handle and at most one open
/// transaction.
///
/// All synchronization happens in the store. Any number of clients may
/// share a store; each is single-threaded within itself. Two clients that
/// begin against the same log tail will race their commits on the same log
/// name, and put-if-absent lets exactly one win.
pub struct Database<S: ObjectStore> {
    store: S,
    tx: Option<Transaction>,
}

impl<S: ObjectStore> Database<S> {
    pub fn new(store: S) -> Self {
        Self { store, tx: None }
    }

    /// Begins a transaction, snapshotting the committed log.
    ///
    /// Lists the `_log_` prefix, targets the next id for commit, and folds
    /// every manifest in ascending order into the transaction's view of
    /// tables and data objects. Log entries committed after this point are
    /// invisible to the transaction.
    pub fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(Error::ExistingTransaction);
        }

        let logs = self.store.list_prefix(LOG_PREFIX)?;
        let next_id = match logs.last() {
            Some(name) => parse_log_id(name)? + 1,
            None => 1,
        };

        let mut tx = Transaction::new(next_id);
        for name in &logs {
            let bytes = self.store.read(name)?;
            let manifest = Manifest::decode(&bytes)
                .map_err(|err| Error::CorruptLog(format!("{name}: {err}")))?;
            tx.apply(&manifest)?;
        }

        tracing::debug!(tx_id = tx.id(), manifests = logs.len(), "began transaction");
        self.tx = Some(tx);
        Ok(())
    }

    /// Creates a table with the given column names.
    ///
    /// Recorded both in the transaction's table map and as a pending
    /// metadata action, so the table is visible to this transaction
    /// immediately and to others once committed.
    pub fn create_table(&mut self, table: &str, columns: Vec<String>) -> Result<()> {
        let tx = self.tx.as_mut().ok_or(Error::NoTransaction)?;
        if table.is_empty() {
            return errinput!("table name must not be empty");
        }
        if tx.knows_table(table) {
            return Err(Error::TableExists(table.to_owned()));
        }
        tx.create_table(table, columns);
        Ok(())
    }

    /// Appends a row to the table's unflushed buffer, sealing the buffer
    /// into a data object first if it is at capacity.
    pub fn write_row(&mut self, table: &str, row: Row) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::NoTransaction)?;
        let Some(columns) = tx.columns(table) else {
            return Err(Error::NoSuchTable(table.to_owned()));
        };
        if row.len() != columns.len() {
            return errinput!(
                "row has {} values, table {table} has {} columns",
                row.len(),
                columns.len()
            );
        }

        if tx.unflushed_len(table) >= DATAOBJECT_SIZE {
            let tx = self.tx.as_mut().ok_or(Error::NoTransaction)?;
            Self::flush_table(&self.store, tx, table)?;
        }

        let tx = self.tx.as_mut().ok_or(Error::NoTransaction)?;
        tx.push_row(table, row)
    }

    /// Seals the table's unflushed rows into a data object and records the
    /// pending action. No-op when the buffer is empty or absent.
    pub fn flush_rows(&mut self, table: &str) -> Result<()> {
        let tx = self.tx.as_mut().ok_or(Error::NoTransaction)?;
        Self::flush_table(&self.store, tx, table)
    }

    /// Scans the table's rows visible to this transaction: unflushed rows
    /// first, then durable data objects in insertion order. The iterator
    /// captures the buffer by value, so later writes to the transaction do
    /// not leak into it. A table unknown to the transaction scans as empty.
    pub fn scan(&self, table: &str) -> Result<ScanIter<'_, S>> {
        let tx = self.tx.as_ref().ok_or(Error::NoTransaction)?;
        Ok(ScanIter::new(
            &self.store,
            table,
            tx.data_objects(table),
            tx.unflushed_snapshot(table),
        ))
    }

    /// Commits the transaction.
    ///
    /// Flushes every table's buffer, then publishes the pending manifest at
    /// the transaction's log name via put-if-absent. Losing the name to a
    /// concurrent committer is a [`Error::CommitConflict`]; the loser's
    /// flushed data objects stay in the store but nothing references them.
    /// A transaction with no pending actions commits read-only, writing no
    /// manifest and racing nobody. The transaction is consumed on every
    /// outcome.
    pub fn commit(&mut self) -> Result<()> {
        let mut tx = self.tx.take().ok_or(Error::NoTransaction)?;

        for table in tx.table_names() {
            Self::flush_table(&self.store, &mut tx, &table)?;
        }

        if !tx.has_pending() {
            tracing::debug!(tx_id = tx.id(), "read-only commit, no manifest written");
            return Ok(());
        }

        let manifest = tx.into_manifest();
        let key = log_key(manifest.id);
        match self.store.put_if_absent(&key, &manifest.encode()) {
            Ok(()) => {
                tracing::info!(tx_id = manifest.id, "committed transaction");
                Ok(())
            }
            Err(Error::AlreadyExists(_)) => {
                tracing::warn!(tx_id = manifest.id, "lost log slot to concurrent committer");
                Err(Error::CommitConflict)
            }
            Err(err) => Err(err),
        }
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    fn flush_table(store: &S, tx: &mut Transaction, table: &str) -> Result<()> {
        let Some(rows) = tx.take_unflushed(table) else {
            return Ok(());
        };

        let object = DataObject::seal(table, rows);
        if let Err(err) = store.put_if_absent(&object.key(), &object.encode()) {
            // Leave the rows buffered so the caller can retry or abandon.
            tx.restore_unflushed(table, object.rows);
            return Err(err);
        }

        tracing::debug!(
            table = table,
            object = object.name.as_str(),
            rows = object.len,
            "flushed rows to data object"
        );
        tx.push_pending(
            table,
            crate::manifest::Action::AddDataObject {
                table: table.to_owned(),
                name: object.name,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataobject::TABLE_PREFIX;
    use crate::row;
    use crate::storage::{FileObjectStore, MemoryObjectStore};
    use crate::value::Value;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    fn collect<S: ObjectStore>(db: &Database<S>, table: &str) -> Vec<Row> {
        db.scan(table).unwrap().collect::<Result<_>>().unwrap()
    }

    #[test]
    fn test_begin_forbids_nesting() -> Result<()> {
        let mut db = Database::new(MemoryObjectStore::new());
        db.begin()?;
        assert_eq!(db.begin(), Err(Error::ExistingTransaction));
        Ok(())
    }

    #[test]
    fn test_operations_require_transaction() {
        let mut db = Database::new(MemoryObjectStore::new());
        assert_eq!(
            db.create_table("x", columns(&["a"])),
            Err(Error::NoTransaction)
        );
        assert_eq!(db.write_row("x", row![1]), Err(Error::NoTransaction));
        assert_eq!(db.flush_rows("x"), Err(Error::NoTransaction));
        assert_eq!(db.commit(), Err(Error::NoTransaction));
        assert!(matches!(db.scan("x"), Err(Error::NoTransaction)));
    }

    #[test]
    fn test_create_table_twice_fails() -> Result<()> {
        let mut db = Database::new(MemoryObjectStore::new());
        db.begin()?;
        db.create_table("x", columns(&["a"]))?;
        assert_eq!(
            db.create_table("x", columns(&["a"])),
            Err(Error::TableExists("x".to_owned()))
        );
        Ok(())
    }

    #[test]
    fn test_create_table_exists_across_transactions() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut db = Database::new(store.clone());
        db.begin()?;
        db.create_table("x", columns(&["a"]))?;
        db.commit()?;

        let mut other = Database::new(store);
        other.begin()?;
        assert_eq!(
            other.create_table("x", columns(&["a"])),
            Err(Error::TableExists("x".to_owned()))
        );
        Ok(())
    }

    #[test]
    fn test_write_row_unknown_table() -> Result<()> {
        let mut db = Database::new(MemoryObjectStore::new());
        db.begin()?;
        assert_eq!(
            db.write_row("x", row![1]),
            Err(Error::NoSuchTable("x".to_owned()))
        );
        Ok(())
    }

    #[test]
    fn test_write_row_arity_enforced() -> Result<()> {
        let mut db = Database::new(MemoryObjectStore::new());
        db.begin()?;
        db.create_table("x", columns(&["a", "b"]))?;
        assert!(matches!(
            db.write_row("x", row![1]),
            Err(Error::InvalidInput(_))
        ));
        Ok(())
    }

    #[test]
    fn test_empty_table_name_rejected() -> Result<()> {
        let mut db = Database::new(MemoryObjectStore::new());
        db.begin()?;
        assert!(matches!(
            db.create_table("", columns(&["a"])),
            Err(Error::InvalidInput(_))
        ));
        Ok(())
    }

    /// Two writers race on the same log slot; exactly one commit wins.
    #[test]
    fn test_concurrent_writers_conflict() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut a = Database::new(store.clone());
        let mut b = Database::new(store);

        b.begin()?;
        a.begin()?;

        b.create_table("x", columns(&["a", "b"]))?;
        b.write_row("x", row!["Holly", 1])?;

        a.create_table("x", columns(&["a", "b"]))?;
        a.write_row("x", row!["Joey", 1])?;
        a.write_row("x", row!["Yue", 2])?;
        a.commit()?;

        assert_eq!(b.commit(), Err(Error::CommitConflict));
        // Both transactions are consumed either way.
        assert!(!b.in_transaction());
        Ok(())
    }

    /// A reader that began before a concurrent write commits sees only the
    /// snapshot; the writer's own scan sees its unflushed rows first.
    #[test]
    fn test_snapshot_isolation_and_read_your_writes() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut writer = Database::new(store.clone());
        let mut reader = Database::new(store);

        writer.begin()?;
        writer.create_table("x", columns(&["a", "b"]))?;
        writer.write_row("x", row!["Joey", 1])?;
        writer.write_row("x", row!["Yue", 2])?;
        writer.commit()?;

        writer.begin()?;
        reader.begin()?;
        writer.write_row("x", row!["Ada", 3])?;

        // Reader: exactly the committed rows, integers widened by the
        // codec round-trip.
        assert_eq!(
            collect(&reader, "x"),
            vec![row!["Joey", 1.0], row!["Yue", 2.0]]
        );

        // Writer: own unflushed row first, original integer kind intact,
        // then the durable rows.
        assert_eq!(
            collect(&writer, "x"),
            vec![row!["Ada", 3], row!["Joey", 1.0], row!["Yue", 2.0]]
        );

        writer.commit()?;
        reader.commit()?;
        Ok(())
    }

    /// A scan constructed before later writes must not see them.
    #[test]
    fn test_scan_captures_buffer_at_call_time() -> Result<()> {
        let mut db = Database::new(MemoryObjectStore::new());
        db.begin()?;
        db.create_table("x", columns(&["a"]))?;
        db.write_row("x", row![1])?;

        let rows: Vec<Row> = db.scan("x")?.collect::<Result<_>>()?;
        db.write_row("x", row![2])?;

        assert_eq!(rows, vec![row![1]]);
        assert_eq!(collect(&db, "x"), vec![row![1], row![2]]);
        Ok(())
    }

    /// Writing past capacity seals exactly one data object and leaves the
    /// overflow row buffered.
    #[test]
    fn test_flush_at_capacity() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut db = Database::new(store.clone());
        db.begin()?;
        db.create_table("x", columns(&["n"]))?;

        for i in 0..=DATAOBJECT_SIZE as i64 {
            db.write_row("x", row![i])?;
        }

        assert_eq!(store.list_prefix(TABLE_PREFIX)?.len(), 1);

        let rows = collect(&db, "x");
        assert_eq!(rows.len(), DATAOBJECT_SIZE + 1);
        // The overflow row is still buffered, so it scans first and keeps
        // its integer kind.
        assert_eq!(rows[0], row![DATAOBJECT_SIZE as i64]);
        assert_eq!(rows[1], row![0.0]);
        Ok(())
    }

    /// A transaction that wrote nothing commits without a manifest.
    #[test]
    fn test_read_only_commit_writes_no_manifest() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut db = Database::new(store.clone());
        db.begin()?;
        db.create_table("x", columns(&["a"]))?;
        db.commit()?;
        assert_eq!(store.list_prefix(LOG_PREFIX)?.len(), 1);

        let mut reader = Database::new(store.clone());
        reader.begin()?;
        assert_eq!(collect(&reader, "x"), Vec::<Row>::new());
        reader.commit()?;

        assert_eq!(store.list_prefix(LOG_PREFIX)?.len(), 1);
        Ok(())
    }

    /// Sequential commits claim contiguous, zero-padded log names.
    #[test]
    fn test_log_key_sequence() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut db = Database::new(store.clone());

        for table in ["x", "y", "z"] {
            db.begin()?;
            db.create_table(table, columns(&["a"]))?;
            db.commit()?;
        }

        assert_eq!(
            store.list_prefix(LOG_PREFIX)?,
            vec![
                "_log_00000000000000000001".to_owned(),
                "_log_00000000000000000002".to_owned(),
                "_log_00000000000000000003".to_owned(),
            ]
        );
        Ok(())
    }

    /// The loser's flushed data objects stay in the store but no scan
    /// reaches them.
    #[test]
    fn test_orphaned_objects_are_invisible() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut a = Database::new(store.clone());
        let mut b = Database::new(store.clone());

        a.begin()?;
        b.begin()?;

        a.create_table("x", columns(&["a"]))?;
        a.write_row("x", row!["winner"])?;

        b.create_table("x", columns(&["a"]))?;
        b.write_row("x", row!["loser"])?;
        b.flush_rows("x")?;

        a.commit()?;
        assert_eq!(b.commit(), Err(Error::CommitConflict));

        // The orphan blob exists, but a fresh reader only sees the
        // winner's row.
        assert_eq!(store.list_prefix(TABLE_PREFIX)?.len(), 2);
        let mut reader = Database::new(store);
        reader.begin()?;
        assert_eq!(collect(&reader, "x"), vec![row!["winner"]]);
        Ok(())
    }

    #[test]
    fn test_flush_rows_empty_is_noop() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut db = Database::new(store.clone());
        db.begin()?;
        db.create_table("x", columns(&["a"]))?;
        db.flush_rows("x")?;
        db.flush_rows("unknown")?;
        assert_eq!(store.list_prefix(TABLE_PREFIX)?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_scan_unknown_table_is_empty() -> Result<()> {
        let mut db = Database::new(MemoryObjectStore::new());
        db.begin()?;
        assert_eq!(collect(&db, "ghost"), Vec::<Row>::new());
        Ok(())
    }

    #[test]
    fn test_corrupt_manifest_fails_begin() -> Result<()> {
        let store = MemoryObjectStore::new();
        store.put_if_absent(&log_key(1), b"not a manifest")?;

        let mut db = Database::new(store);
        assert!(matches!(db.begin(), Err(Error::CorruptLog(_))));
        Ok(())
    }

    #[test]
    fn test_commit_consumed_on_every_outcome() -> Result<()> {
        let store = MemoryObjectStore::new();
        let mut a = Database::new(store.clone());
        let mut b = Database::new(store);

        a.begin()?;
        b.begin()?;
        a.create_table("x", columns(&["a"]))?;
        b.create_table("y", columns(&["a"]))?;
        a.commit()?;
        assert!(!a.in_transaction());
        b.commit().unwrap_err();
        assert!(!b.in_transaction());

        // Both clients can begin fresh transactions afterwards.
        a.begin()?;
        b.begin()?;
        Ok(())
    }

    /// A store failure mid-flush leaves the buffer intact for retry.
    #[test]
    fn test_failed_flush_keeps_buffer() -> Result<()> {
        struct FailingStore {
            inner: MemoryObjectStore,
            fail_puts: std::sync::atomic::AtomicBool,
        }

        impl ObjectStore for FailingStore {
            fn put_if_absent(&self, name: &str, bytes: &[u8]) -> Result<()> {
                if self.fail_puts.load(std::sync::atomic::Ordering::SeqCst) {
                    return Err(Error::IO("injected write failure".to_owned()));
                }
                self.inner.put_if_absent(name, bytes)
            }

            fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
                self.inner.list_prefix(prefix)
            }

            fn read(&self, name: &str) -> Result<Vec<u8>> {
                self.inner.read(name)
            }
        }

        let store = FailingStore {
            inner: MemoryObjectStore::new(),
            fail_puts: std::sync::atomic::AtomicBool::new(false),
        };
        let mut db = Database::new(store);
        db.begin()?;
        db.create_table("x", columns(&["a"]))?;
        db.write_row("x", row![1])?;

        db.store.fail_puts.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(
            db.flush_rows("x"),
            Err(Error::IO("injected write failure".to_owned()))
        );

        // The row is still buffered; the retry flushes it.
        db.store.fail_puts.store(false, std::sync::atomic::Ordering::SeqCst);
        db.flush_rows("x")?;
        assert_eq!(collect(&db, "x"), vec![row![1.0]]);
        Ok(())
    }

    /// Schema changes committed later overwrite earlier ones in a new
    /// transaction's snapshot.
    #[test]
    fn test_later_metadata_wins_in_snapshot() -> Result<()> {
        let store = MemoryObjectStore::new();

        // Two manifests both carrying metadata for x, written directly the
        // way two committed transactions would leave them.
        for (id, cols) in [(1u64, vec!["a"]), (2u64, vec!["a", "b"])] {
            let mut actions = std::collections::BTreeMap::new();
            actions.insert(
                "x".to_owned(),
                vec![crate::manifest::Action::ChangeMetadata {
                    table: "x".to_owned(),
                    columns: columns(&cols),
                }],
            );
            let manifest = Manifest {
                id,
                actions,
                tables: std::collections::BTreeMap::new(),
            };
            store.put_if_absent(&log_key(id), &manifest.encode())?;
        }

        let mut db = Database::new(store);
        db.begin()?;
        db.write_row("x", row!["v", 1])?;
        assert!(matches!(db.write_row("x", row!["v"]), Err(Error::InvalidInput(_))));
        Ok(())
    }

    /// The whole lifecycle against the file-backed store.
    #[test]
    fn test_end_to_end_on_files() -> Result<()> {
        let dir = tempfile::TempDir::new()?;

        let mut writer = Database::new(FileObjectStore::new(dir.path())?);
        writer.begin()?;
        writer.create_table("x", columns(&["a", "b"]))?;
        writer.write_row("x", row!["Joey", 1])?;
        writer.write_row("x", row![Value::Null, 2.5])?;
        writer.commit()?;

        let mut reader = Database::new(FileObjectStore::new(dir.path())?);
        reader.begin()?;
        assert_eq!(
            collect(&reader, "x"),
            vec![row!["Joey", 1.0], row![Value::Null, 2.5]]
        );
        reader.commit()?;
        Ok(())
    }
}
