use std::sync::Arc;

use tracing::trace;

use super::{Row, RowId};
use crate::catalog::table::Table;

#[derive(Debug)]
pub enum UndoEntry {
    Insert { table: Arc<Table>, row_id: RowId },
    Delete { table: Arc<Table>, row_id: RowId, row: Row },
    Update { table: Arc<Table>, row_id: RowId, old: Row },
}

impl UndoEntry {
    fn undo(self) {
        match self {
            Self::Insert { table, row_id } => {
                table.storage().delete(row_id);
            }
            Self::Delete { table, row_id, row } => {
                table.storage().insert_with_id(row_id, row);
            }
            Self::Update { table, row_id, old } => {
                table.storage().update(row_id, old);
            }
        }
    }
}

/// Row changes made by a transaction, oldest first.
///
/// A position in the log is the marker savepoints and statements roll back
/// to.
#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn position(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record_insert(&mut self, table: &Arc<Table>, row_id: RowId) {
        self.entries.push(UndoEntry::Insert {
            table: table.clone(),
            row_id,
        });
    }

    pub fn record_delete(&mut self, table: &Arc<Table>, row_id: RowId, row: Row) {
        self.entries.push(UndoEntry::Delete {
            table: table.clone(),
            row_id,
            row,
        });
    }

    pub fn record_update(&mut self, table: &Arc<Table>, row_id: RowId, old: Row) {
        self.entries.push(UndoEntry::Update {
            table: table.clone(),
            row_id,
            old,
        });
    }

    /// Undo every change after `position`, newest first.
    ///
    /// Returns the number of undone changes.
    pub fn rollback_to(&mut self, position: usize) -> usize {
        let mut undone = 0;
        while self.entries.len() > position {
            if let Some(entry) = self.entries.pop() {
                entry.undo();
                undone += 1;
            }
        }
        trace!(%position, %undone, "rolled back undo log");
        undone
    }

    /// Forget all changes, making them permanent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
