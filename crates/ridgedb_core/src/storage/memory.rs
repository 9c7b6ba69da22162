use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{Row, RowId};

/// Rows for a single table keyed by row id.
#[derive(Debug, Default)]
pub struct TableStorage {
    rows: Mutex<BTreeMap<RowId, Row>>,
    next_id: AtomicU64,
}

impl TableStorage {
    pub fn insert(&self, row: Row) -> RowId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.rows.lock().insert(id, row);
        id
    }

    /// Put a row back under its original id.
    pub fn insert_with_id(&self, id: RowId, row: Row) {
        self.rows.lock().insert(id, row);
    }

    pub fn delete(&self, id: RowId) -> Option<Row> {
        self.rows.lock().remove(&id)
    }

    /// Replace a row, returning the previous version.
    pub fn update(&self, id: RowId, row: Row) -> Option<Row> {
        let mut rows = self.rows.lock();
        let ent = rows.get_mut(&id)?;
        Some(std::mem::replace(ent, row))
    }

    pub fn get(&self, id: RowId) -> Option<Row> {
        self.rows.lock().get(&id).cloned()
    }

    /// Snapshot of all rows in id order.
    pub fn scan(&self) -> Vec<(RowId, Row)> {
        self.rows
            .lock()
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}
