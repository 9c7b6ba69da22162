//! In-memory row storage and the per-transaction undo log.
//!
//! No isolation between sessions. Rows written by one session are visible to
//! all others immediately and rollback restores rows through the undo log.
pub mod memory;
pub mod undo;

use crate::scalar::ScalarValue;

pub type RowId = u64;
pub type Row = Vec<ScalarValue>;
