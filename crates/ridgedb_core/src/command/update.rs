use std::sync::Arc;

use ridgedb_error::Result;

use super::context::ExecutionContext;
use super::dml::{self, Filter, update_row};
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::database::Database;
use crate::catalog::rights::Right;
use crate::catalog::table::Table;
use crate::expr::{self, Expression};

/// UPDATE table SET col = expr, ... [WHERE col = expr]
#[derive(Debug, Clone)]
pub struct Update {
    table: Arc<Table>,
    assignments: Vec<(String, Expression)>,
    filter: Option<Filter>,
}

impl Update {
    pub fn try_new<S: Into<String>>(
        table: &Arc<Table>,
        assignments: impl IntoIterator<Item = (S, Expression)>,
        filter: Option<Filter>,
    ) -> Result<Self> {
        let assignments: Vec<(String, Expression)> = assignments
            .into_iter()
            .map(|(col, expr)| (col.into(), expr))
            .collect();
        for (col, _) in &assignments {
            table.resolve_column(col)?;
        }
        Ok(Update {
            table: table.clone(),
            assignments,
            filter,
        })
    }
}

impl ExecuteCommand for Update {
    fn parameter_count(&self) -> usize {
        let filter = self.filter.iter().map(|f| &f.value);
        expr::parameter_count(self.assignments.iter().map(|(_, e)| e).chain(filter))
    }

    fn is_transactional(&self) -> bool {
        true
    }

    fn rebind(&mut self, database: &Database) -> Result<()> {
        dml::rebind_table(&mut self.table, database)
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        ctx.check_right(self.table.key(), Right::UPDATE)?;
        let filter = self
            .filter
            .as_ref()
            .map(|f| f.bind(&self.table, ctx))
            .transpose()?;

        let mut targets = Vec::with_capacity(self.assignments.len());
        for (col, expr) in &self.assignments {
            targets.push((self.table.resolve_column(col)?, expr));
        }

        let mut count = 0;
        for (id, mut row) in self.table.storage().scan() {
            if !dml::matches(filter.as_ref(), &row) {
                continue;
            }
            ctx.check_canceled()?;

            for (idx, expr) in &targets {
                let value = ctx.eval(expr)?;
                row[*idx] = match self.table.column(*idx) {
                    Some(col) => value.cast_to(col.datatype)?,
                    None => value,
                };
            }
            update_row(ctx, &self.table, id, row)?;
            count += 1;
        }

        Ok(ExecutionResult::RowCount(count))
    }
}
