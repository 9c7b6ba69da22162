use std::sync::Arc;

use ridgedb_error::Result;

use super::context::ExecutionContext;
use super::dml::{self, Filter};
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::database::Database;
use crate::catalog::rights::Right;
use crate::catalog::table::Table;

/// DELETE FROM table [WHERE col = expr]
#[derive(Debug, Clone)]
pub struct Delete {
    table: Arc<Table>,
    filter: Option<Filter>,
}

impl Delete {
    pub fn new(table: &Arc<Table>, filter: Option<Filter>) -> Self {
        Delete {
            table: table.clone(),
            filter,
        }
    }
}

impl ExecuteCommand for Delete {
    fn parameter_count(&self) -> usize {
        self.filter
            .as_ref()
            .map(|f| f.value.parameter_count())
            .unwrap_or(0)
    }

    fn is_transactional(&self) -> bool {
        true
    }

    fn rebind(&mut self, database: &Database) -> Result<()> {
        dml::rebind_table(&mut self.table, database)
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        ctx.check_right(self.table.key(), Right::DELETE)?;
        let filter = self
            .filter
            .as_ref()
            .map(|f| f.bind(&self.table, ctx))
            .transpose()?;

        let mut count = 0;
        for (id, row) in self.table.storage().scan() {
            if !dml::matches(filter.as_ref(), &row) {
                continue;
            }
            ctx.check_canceled()?;
            if let Some(row) = self.table.storage().delete(id) {
                ctx.undo.record_delete(&self.table, id, row);
                count += 1;
            }
        }

        Ok(ExecutionResult::RowCount(count))
    }
}
