use std::sync::Arc;

use ridgedb_error::Result;

use super::context::ExecutionContext;
use super::dml::{self, Filter, resolve_columns};
use super::{ExecuteCommand, ExecutionResult, QueryResult};
use crate::catalog::database::Database;
use crate::catalog::rights::Right;
use crate::catalog::table::Table;
use crate::expr::{self, Expression};

#[derive(Debug, Clone)]
enum SelectSource {
    /// SELECT cols FROM table [WHERE col = expr]
    Table {
        table: Arc<Table>,
        columns: Vec<String>,
        filter: Option<Filter>,
    },
    /// SELECT expr AS name, ...
    Values(Vec<(String, Expression)>),
}

#[derive(Debug, Clone)]
pub struct Select {
    source: SelectSource,
}

impl Select {
    /// Select columns from a table, every column if `columns` is empty.
    pub fn from_table<S: Into<String>>(
        table: &Arc<Table>,
        columns: impl IntoIterator<Item = S>,
        filter: Option<Filter>,
    ) -> Result<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        resolve_columns(table, &columns)?;
        Ok(Select {
            source: SelectSource::Table {
                table: table.clone(),
                columns,
                filter,
            },
        })
    }

    /// Select a single row of expressions.
    pub fn values<S: Into<String>>(columns: Vec<(S, Expression)>) -> Self {
        Select {
            source: SelectSource::Values(
                columns
                    .into_iter()
                    .map(|(name, expr)| (name.into(), expr))
                    .collect(),
            ),
        }
    }
}

impl ExecuteCommand for Select {
    fn parameter_count(&self) -> usize {
        match &self.source {
            SelectSource::Table { filter, .. } => filter
                .as_ref()
                .map(|f| f.value.parameter_count())
                .unwrap_or(0),
            SelectSource::Values(exprs) => expr::parameter_count(exprs.iter().map(|(_, e)| e)),
        }
    }

    fn is_transactional(&self) -> bool {
        true
    }

    fn is_query(&self) -> bool {
        true
    }

    fn rebind(&mut self, database: &Database) -> Result<()> {
        match &mut self.source {
            SelectSource::Table { table, .. } => dml::rebind_table(table, database),
            SelectSource::Values(_) => Ok(()),
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        match &self.source {
            SelectSource::Table {
                table,
                columns,
                filter,
            } => {
                ctx.check_right(table.key(), Right::SELECT)?;
                let indices = resolve_columns(table, columns)?;
                let filter = filter.as_ref().map(|f| f.bind(table, ctx)).transpose()?;

                let mut rows = Vec::new();
                for (_, row) in table.storage().scan() {
                    if !dml::matches(filter.as_ref(), &row) {
                        continue;
                    }
                    ctx.check_canceled()?;
                    rows.push(indices.iter().map(|&idx| row[idx].clone()).collect());
                }

                let columns = indices
                    .iter()
                    .filter_map(|&idx| table.column(idx).map(|c| c.name.clone()))
                    .collect();
                Ok(ExecutionResult::Query(QueryResult { columns, rows }))
            }
            SelectSource::Values(exprs) => {
                let mut row = Vec::with_capacity(exprs.len());
                for (_, expr) in exprs {
                    row.push(ctx.eval(expr)?);
                }
                Ok(ExecutionResult::Query(QueryResult {
                    columns: exprs.iter().map(|(name, _)| name.clone()).collect(),
                    rows: vec![row],
                }))
            }
        }
    }
}
