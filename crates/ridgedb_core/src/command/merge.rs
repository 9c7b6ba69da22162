use std::sync::Arc;

use ridgedb_error::{DbError, ErrorKind, Result};
use tracing::trace;

use super::context::ExecutionContext;
use super::dml::{self, check_value_count, complete_row, eval_values, insert_row, resolve_columns, update_row};
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::database::Database;
use crate::catalog::rights::Right;
use crate::catalog::table::Table;
use crate::expr::{self, Expression};

/// MERGE INTO table (columns) KEY (key_columns) VALUES (...)
///
/// Updates the row with equal key values if there is one, inserts otherwise.
/// Only inserted rows produce generated keys.
#[derive(Debug, Clone)]
pub struct Merge {
    table: Arc<Table>,
    columns: Vec<String>,
    /// Empty means the primary key.
    key_columns: Vec<String>,
    rows: Vec<Vec<Expression>>,
}

impl Merge {
    pub fn try_new<S: Into<String>, K: Into<String>>(
        table: &Arc<Table>,
        columns: impl IntoIterator<Item = S>,
        key_columns: impl IntoIterator<Item = K>,
        rows: Vec<Vec<Expression>>,
    ) -> Result<Self> {
        let merge = Merge {
            table: table.clone(),
            columns: columns.into_iter().map(Into::into).collect(),
            key_columns: key_columns.into_iter().map(Into::into).collect(),
            rows,
        };
        let (columns, _) = merge.resolve()?;
        for row in &merge.rows {
            check_value_count(table, columns.len(), row)?;
        }
        Ok(merge)
    }

    /// Resolve value and key columns. Every key column must be given a value.
    fn resolve(&self) -> Result<(Vec<usize>, Vec<usize>)> {
        let columns = resolve_columns(&self.table, &self.columns)?;
        let keys = if self.key_columns.is_empty() {
            self.table.primary_key_indices()
        } else {
            resolve_columns(&self.table, &self.key_columns)?
        };

        if keys.is_empty() {
            return Err(DbError::new_kind(
                ErrorKind::InvalidState,
                "MERGE requires key columns or a primary key",
            )
            .with_field("table", self.table.key()));
        }
        if let Some(missing) = keys.iter().find(|&&k| !columns.contains(&k)) {
            let name = self
                .table
                .column(*missing)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            return Err(DbError::new_kind(
                ErrorKind::InvalidValue,
                "Key column must be part of the merged columns",
            )
            .with_field("column", name));
        }

        Ok((columns, keys))
    }
}

impl ExecuteCommand for Merge {
    fn parameter_count(&self) -> usize {
        expr::parameter_count(self.rows.iter().flatten())
    }

    fn is_transactional(&self) -> bool {
        true
    }

    fn rebind(&mut self, database: &Database) -> Result<()> {
        dml::rebind_table(&mut self.table, database)
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        ctx.check_right(self.table.key(), Right::INSERT.union(Right::UPDATE))?;
        let (columns, keys) = self.resolve()?;

        let mut count = 0;
        for exprs in &self.rows {
            ctx.check_canceled()?;
            check_value_count(&self.table, columns.len(), exprs)?;

            let values = eval_values(ctx, &self.table, &columns, exprs)?;
            let existing = self.table.storage().scan().into_iter().find(|(_, row)| {
                keys.iter()
                    .all(|&k| values.get(k).is_some_and(|v| row[k].sql_eq(v)))
            });

            match existing {
                Some((id, mut row)) => {
                    for (idx, value) in values.values {
                        row[idx] = value;
                    }
                    update_row(ctx, &self.table, id, row)?;
                    trace!(table = %self.table.key(), row_id = %id, "merge updated row");
                }
                None => {
                    let (row, key) = complete_row(ctx, &self.table, values)?;
                    let id = insert_row(ctx, &self.table, row)?;
                    trace!(table = %self.table.key(), row_id = %id, "merge inserted row");
                    if let Some(key) = key {
                        ctx.push_generated_key(key)?;
                    }
                }
            }
            count += 1;
        }

        Ok(ExecutionResult::RowCount(count))
    }
}
