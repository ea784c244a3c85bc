use std::collections::BTreeMap;

use crate::dataobject::DATAOBJECT_SIZE;
use crate::error::Result;
use crate::errdata;
use crate::manifest::{Action, Manifest};
use crate::value::Row;

/// In-memory state of one open transaction.
///
/// Holds the snapshot folded from the committed log at begin
/// (`previous_actions`), the actions this transaction has performed
/// (`pending_actions`), the table metadata visible to it, and the per-table
/// row buffers that have not yet been sealed into data objects. Only the
/// id, pending actions, and tables are ever persisted; everything else
/// dies with the transaction.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    previous_actions: BTreeMap<String, Vec<Action>>,
    pending_actions: BTreeMap<String, Vec<Action>>,
    tables: BTreeMap<String, Vec<String>>,
    unflushed: BTreeMap<String, Vec<Row>>,
}

impl Transaction {
    /// Creates an empty transaction targeting the given log id.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            previous_actions: BTreeMap::new(),
            pending_actions: BTreeMap::new(),
            tables: BTreeMap::new(),
            unflushed: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Folds one committed manifest into the snapshot. Manifests must be
    /// applied in ascending id order: later metadata overwrites earlier.
    pub fn apply(&mut self, manifest: &Manifest) -> Result<()> {
        for actions in manifest.actions.values() {
            for action in actions {
                match action {
                    Action::ChangeMetadata { table, columns } => {
                        self.tables.insert(table.clone(), columns.clone());
                    }
                    Action::AddDataObject { table, name } => {
                        self.previous_actions
                            .entry(table.clone())
                            .or_default()
                            .push(Action::AddDataObject {
                                table: table.clone(),
                                name: name.clone(),
                            });
                    }
                }
            }
        }
        Ok(())
    }

    /// The column names of a table, if this transaction knows it.
    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Whether the table is known, from the snapshot or from this
    /// transaction's own create.
    pub fn knows_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Names of all tables visible to this transaction.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Records a table creation: metadata plus the pending action.
    pub fn create_table(&mut self, table: &str, columns: Vec<String>) {
        self.tables.insert(table.to_owned(), columns.clone());
        self.push_pending(
            table,
            Action::ChangeMetadata {
                table: table.to_owned(),
                columns,
            },
        );
    }

    /// Appends an action to the pending manifest.
    pub fn push_pending(&mut self, table: &str, action: Action) {
        self.pending_actions
            .entry(table.to_owned())
            .or_default()
            .push(action);
    }

    /// Whether this transaction has performed any action. A transaction
    /// without pending actions commits read-only.
    pub fn has_pending(&self) -> bool {
        self.pending_actions.values().any(|actions| !actions.is_empty())
    }

    /// Appends a row to the table's unflushed buffer, initializing it
    /// lazily on first write.
    pub fn push_row(&mut self, table: &str, row: Row) -> Result<()> {
        let buffer = self
            .unflushed
            .entry(table.to_owned())
            .or_insert_with(|| Vec::with_capacity(DATAOBJECT_SIZE));
        if buffer.len() >= DATAOBJECT_SIZE {
            // The client flushes full buffers before appending.
            return errdata!("unflushed buffer for table {table} is full");
        }
        buffer.push(row);
        Ok(())
    }

    /// Number of unflushed rows buffered for the table.
    pub fn unflushed_len(&self, table: &str) -> usize {
        self.unflushed.get(table).map_or(0, Vec::len)
    }

    /// Takes the table's buffered rows for sealing, leaving the buffer
    /// empty. Returns None when there is nothing to flush.
    pub fn take_unflushed(&mut self, table: &str) -> Option<Vec<Row>> {
        match self.unflushed.get_mut(table) {
            Some(buffer) if !buffer.is_empty() => Some(std::mem::take(buffer)),
            _ => None,
        }
    }

    /// Puts rows back after a failed flush so the caller can retry.
    pub fn restore_unflushed(&mut self, table: &str, rows: Vec<Row>) {
        let buffer = self.unflushed.entry(table.to_owned()).or_default();
        // The buffer was emptied by take_unflushed; new writes cannot have
        // arrived in between.
        debug_assert!(buffer.is_empty());
        *buffer = rows;
    }

    /// A by-value snapshot of the table's unflushed rows, for scans.
    pub fn unflushed_snapshot(&self, table: &str) -> Vec<Row> {
        self.unflushed.get(table).cloned().unwrap_or_default()
    }

    /// Names of the durable data objects visible to this transaction for
    /// the table: snapshot objects first, then objects flushed by this
    /// transaction, each in insertion order.
    pub fn data_objects(&self, table: &str) -> Vec<String> {
        let previous = self.previous_actions.get(table).into_iter().flatten();
        let pending = self.pending_actions.get(table).into_iter().flatten();
        previous
            .chain(pending)
            .filter_map(|action| match action {
                Action::AddDataObject { name, .. } => Some(name.clone()),
                Action::ChangeMetadata { .. } => None,
            })
            .collect()
    }

    /// Consumes the transaction into its persisted projection: id, pending
    /// actions, and table metadata. The snapshot and unflushed buffers are
    /// dropped here and never reach disk.
    pub fn into_manifest(self) -> Manifest {
        Manifest {
            id: self.id,
            actions: self.pending_actions,
            tables: self.tables,
        }
    }
}
