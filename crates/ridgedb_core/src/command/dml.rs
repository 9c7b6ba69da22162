//! Helpers shared by the row changing commands.
use std::sync::Arc;

use ridgedb_error::{DbError, ErrorKind, Result};

use super::context::ExecutionContext;
use crate::catalog::database::Database;
use crate::catalog::table::Table;
use crate::expr::Expression;
use crate::scalar::ScalarValue;
use crate::storage::{Row, RowId};

/// Equality predicate on a single column.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub value: Expression,
}

impl Filter {
    pub fn new(table: &Table, column: impl Into<String>, value: Expression) -> Result<Self> {
        let column = column.into();
        table.resolve_column(&column)?;
        Ok(Filter { column, value })
    }

    /// Evaluate the predicate value once for the whole statement.
    pub(crate) fn bind(&self, table: &Table, ctx: &mut ExecutionContext<'_>) -> Result<BoundFilter> {
        let column = table.resolve_column(&self.column)?;
        let value = ctx.eval(&self.value)?;
        let value = match table.column(column) {
            Some(col) => value.cast_to(col.datatype)?,
            None => value,
        };
        Ok(BoundFilter { column, value })
    }
}

#[derive(Debug)]
pub(crate) struct BoundFilter {
    column: usize,
    value: ScalarValue,
}

impl BoundFilter {
    pub fn matches(&self, row: &Row) -> bool {
        row.get(self.column)
            .is_some_and(|v| v.sql_eq(&self.value))
    }
}

pub(crate) fn matches(filter: Option<&BoundFilter>, row: &Row) -> bool {
    filter.is_none_or(|f| f.matches(row))
}

/// Resolve column names, all columns if `names` is empty.
pub(crate) fn resolve_columns(table: &Table, names: &[String]) -> Result<Vec<usize>> {
    if names.is_empty() {
        return Ok((0..table.columns().len()).collect());
    }
    names.iter().map(|n| table.resolve_column(n)).collect()
}

/// Look up the current version of a table by key.
pub(crate) fn rebind_table(table: &mut Arc<Table>, database: &Database) -> Result<()> {
    let key = table.key().clone();
    *table = database.require_table(&key.schema, &key.name)?;
    Ok(())
}

pub(crate) fn check_value_count(table: &Table, columns: usize, row: &[Expression]) -> Result<()> {
    if columns != row.len() {
        return Err(DbError::new_kind(
            ErrorKind::InvalidValue,
            "Column count does not match",
        )
        .with_field("table", table.key())
        .with_field("columns", columns)
        .with_field("values", row.len()));
    }
    Ok(())
}

/// Evaluated values for a subset of columns.
#[derive(Debug)]
pub(crate) struct RowValues {
    pub values: Vec<(usize, ScalarValue)>,
    /// Last sequence value drawn while evaluating.
    pub drawn: Option<i64>,
}

impl RowValues {
    pub fn get(&self, column: usize) -> Option<&ScalarValue> {
        self.values
            .iter()
            .find(|(idx, _)| *idx == column)
            .map(|(_, v)| v)
    }
}

/// Evaluate a row of expressions, casting each to its column type.
pub(crate) fn eval_values(
    ctx: &mut ExecutionContext<'_>,
    table: &Table,
    columns: &[usize],
    exprs: &[Expression],
) -> Result<RowValues> {
    let mut drawn = None;
    let mut values = Vec::with_capacity(columns.len());
    for (&idx, expr) in columns.iter().zip(exprs) {
        let value = ctx.eval_tracking(expr, &mut drawn)?;
        let value = match table.column(idx) {
            Some(col) => value.cast_to(col.datatype)?,
            None => return Err(DbError::new("Column index out of range").with_field("index", idx)),
        };
        values.push((idx, value));
    }
    Ok(RowValues { values, drawn })
}

/// Build a full row for insert, applying identity defaults.
///
/// Returns the row and its generated key if one was produced.
pub(crate) fn complete_row(
    ctx: &mut ExecutionContext<'_>,
    table: &Table,
    values: RowValues,
) -> Result<(Row, Option<i64>)> {
    let mut row = vec![ScalarValue::Null; table.columns().len()];
    for (idx, value) in values.values {
        row[idx] = value;
    }
    let mut key = values.drawn;

    if let Some((idx, col)) = table.identity_column() {
        if row[idx].is_null() {
            if let Some(seq) = &col.sequence {
                let v = seq.next_value(ctx.database.system_session())?;
                *ctx.last_identity = Some(v);
                row[idx] = ScalarValue::Int64(v).cast_to(col.datatype)?;
            }
        }
        if !row[idx].is_null() {
            key = Some(row[idx].try_as_i64()?);
        }
    }

    check_not_null(table, &row)?;
    Ok((row, key))
}

pub(crate) fn check_not_null(table: &Table, row: &Row) -> Result<()> {
    for (col, value) in table.columns().iter().zip(row) {
        if value.is_null() && !col.nullable {
            return Err(
                DbError::new_kind(ErrorKind::InvalidValue, "NULL not allowed for column")
                    .with_field("table", table.key())
                    .with_field("column", &col.name),
            );
        }
    }
    Ok(())
}

/// Error if another row has the same primary key.
pub(crate) fn check_primary_key(table: &Table, row: &Row, exclude: Option<RowId>) -> Result<()> {
    let pk = table.primary_key_indices();
    if pk.is_empty() {
        return Ok(());
    }

    let conflict = table.storage().scan().into_iter().any(|(id, existing)| {
        Some(id) != exclude && pk.iter().all(|&idx| existing[idx].sql_eq(&row[idx]))
    });
    if conflict {
        let key = pk
            .iter()
            .map(|&idx| row[idx].to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(
            DbError::new_kind(ErrorKind::DuplicateKey, "Unique index or primary key violation")
                .with_field("table", table.key())
                .with_field("key", key),
        );
    }
    Ok(())
}

/// Insert a row and record it in the undo log.
pub(crate) fn insert_row(ctx: &mut ExecutionContext<'_>, table: &Arc<Table>, row: Row) -> Result<RowId> {
    check_primary_key(table, &row, None)?;
    let id = table.storage().insert(row);
    ctx.undo.record_insert(table, id);
    Ok(id)
}

/// Replace a row and record the old version in the undo log.
pub(crate) fn update_row(
    ctx: &mut ExecutionContext<'_>,
    table: &Arc<Table>,
    id: RowId,
    row: Row,
) -> Result<()> {
    check_not_null(table, &row)?;
    check_primary_key(table, &row, Some(id))?;
    if let Some(old) = table.storage().update(id, row) {
        ctx.undo.record_update(table, id, old);
    }
    Ok(())
}
