use std::sync::Arc;

use ridgedb_error::Result;
use tracing::trace;

use super::context::ExecutionContext;
use super::dml::{self, check_value_count, complete_row, eval_values, insert_row, resolve_columns};
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::database::Database;
use crate::catalog::rights::Right;
use crate::catalog::table::Table;
use crate::expr::{self, Expression};

/// INSERT INTO table (columns) VALUES (...), (...)
#[derive(Debug, Clone)]
pub struct Insert {
    table: Arc<Table>,
    /// Empty means every column in table order.
    columns: Vec<String>,
    rows: Vec<Vec<Expression>>,
}

impl Insert {
    pub fn try_new<S: Into<String>>(
        table: &Arc<Table>,
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Expression>>,
    ) -> Result<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let resolved = resolve_columns(table, &columns)?;
        for row in &rows {
            check_value_count(table, resolved.len(), row)?;
        }
        Ok(Insert {
            table: table.clone(),
            columns,
            rows,
        })
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }
}

impl ExecuteCommand for Insert {
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
        ctx.check_right(self.table.key(), Right::INSERT)?;
        let columns = resolve_columns(&self.table, &self.columns)?;

        let mut count = 0;
        for exprs in &self.rows {
            ctx.check_canceled()?;
            check_value_count(&self.table, columns.len(), exprs)?;

            let values = eval_values(ctx, &self.table, &columns, exprs)?;
            let (row, key) = complete_row(ctx, &self.table, values)?;
            let id = insert_row(ctx, &self.table, row)?;
            trace!(table = %self.table.key(), row_id = %id, "inserted row");

            if let Some(key) = key {
                ctx.push_generated_key(key)?;
            }
            count += 1;
        }

        Ok(ExecutionResult::RowCount(count))
    }
}
