use std::sync::Arc;

use ridgedb_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::context::ExecutionContext;
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::rights::Right;
use crate::catalog::sequence::{Sequence, SequenceAlter, SequenceRestart};
use crate::catalog::table::Table;
use crate::expr::{self, Expression};

/// RESTART clause of ALTER SEQUENCE.
#[derive(Debug, Clone)]
pub enum Restart {
    /// RESTART, continue from the start value.
    Start,
    /// RESTART WITH expr
    With(Expression),
}

/// ALTER SEQUENCE name [START WITH expr] [RESTART [WITH expr]] [INCREMENT BY expr]
///
/// Also used for altering the sequence behind an identity column.
#[derive(Debug, Clone)]
pub struct AlterSequence {
    sequence: Arc<Sequence>,
    /// Set when altering through a column. Requires all rights on this table.
    table: Option<Arc<Table>>,
    start: Option<Expression>,
    restart: Option<Restart>,
    increment: Option<Expression>,
}

impl AlterSequence {
    pub fn new(sequence: &Arc<Sequence>) -> Self {
        AlterSequence {
            sequence: sequence.clone(),
            table: None,
            start: None,
            restart: None,
            increment: None,
        }
    }

    /// Alter the sequence providing values for a column.
    pub fn for_column(table: &Arc<Table>, column: &str) -> Result<Self> {
        let idx = table.resolve_column(column)?;
        let sequence = table
            .column(idx)
            .and_then(|c| c.sequence.as_ref())
            .ok_or_else(|| {
                DbError::new_kind(ErrorKind::SequenceNotFound, "Column has no sequence")
                    .with_field("table", table.key())
                    .with_field("column", column)
            })?;

        Ok(AlterSequence {
            table: Some(table.clone()),
            ..Self::new(sequence)
        })
    }

    pub fn with_start(mut self, start: Expression) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_restart(mut self, restart: Restart) -> Self {
        self.restart = Some(restart);
        self
    }

    pub fn with_increment(mut self, increment: Expression) -> Self {
        self.increment = Some(increment);
        self
    }

    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    fn expressions(&self) -> impl Iterator<Item = &Expression> {
        let restart = match &self.restart {
            Some(Restart::With(expr)) => Some(expr),
            _ => None,
        };
        self.start
            .iter()
            .chain(restart)
            .chain(self.increment.iter())
    }
}

impl ExecuteCommand for AlterSequence {
    fn parameter_count(&self) -> usize {
        expr::parameter_count(self.expressions())
    }

    fn is_transactional(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        match &self.table {
            Some(table) => ctx.check_right(table.key(), Right::ALL)?,
            None => ctx.check_schema_owner(&self.sequence.key().schema)?,
        }

        let changes = SequenceAlter {
            start: self.start.as_ref().map(|e| ctx.eval_i64(e)).transpose()?,
            increment: self
                .increment
                .as_ref()
                .map(|e| ctx.eval_i64(e))
                .transpose()?,
            restart: match &self.restart {
                Some(Restart::Start) => Some(SequenceRestart::Start),
                Some(Restart::With(e)) => Some(SequenceRestart::With(ctx.eval_i64(e)?)),
                None => None,
            },
        };

        let sequence = &self.sequence;
        sequence.alter(ctx.database.system_session(), &changes)?;

        debug!(
            sequence = %sequence.key(),
            start = ?changes.start,
            increment = ?changes.increment,
            "altered sequence"
        );

        Ok(ExecutionResult::RowCount(0))
    }
}
