use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ridgedb_error::{DbError, ErrorKind, Result};

use super::procedure::ProcedureRegistry;
use crate::catalog::ObjectKey;
use crate::catalog::database::Database;
use crate::catalog::rights::{Right, User};
use crate::config::session::SessionConfig;
use crate::expr::Expression;
use crate::expr::evaluator::EvalContext;
use crate::scalar::{DataType, ScalarValue};
use crate::storage::undo::UndoLog;

/// Everything a command may touch while executing.
///
/// Borrowed from the session for the duration of one statement.
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    pub database: &'a Arc<Database>,
    pub user: &'a User,
    pub config: &'a SessionConfig,
    /// Bound parameters, replaced while a procedure body runs.
    pub parameters: Vec<ScalarValue>,
    /// Undo log of the open transaction.
    pub undo: &'a mut UndoLog,
    pub procedures: &'a mut ProcedureRegistry,
    pub last_identity: &'a mut Option<i64>,
    pub(crate) generated_keys: Vec<i64>,
    /// Procedures whose bodies are currently running, outermost first.
    pub(crate) procedure_stack: Vec<String>,
    pub(crate) deadline: Option<(Instant, Duration)>,
    pub(crate) cancel: &'a AtomicBool,
}

impl ExecutionContext<'_> {
    /// Evaluate an expression with the current parameters.
    pub fn eval(&mut self, expr: &Expression) -> Result<ScalarValue> {
        let mut drawn = None;
        self.eval_tracking(expr, &mut drawn)
    }

    /// Evaluate an expression, recording the last sequence value it drew in
    /// `drawn`.
    pub fn eval_tracking(&mut self, expr: &Expression, drawn: &mut Option<i64>) -> Result<ScalarValue> {
        let database = self.database;
        let mut eval_ctx = EvalContext::new(
            database.system_session(),
            &self.parameters,
            &mut *self.last_identity,
        );
        let value = database.evaluator().evaluate(expr, &mut eval_ctx)?;
        if eval_ctx.drawn.is_some() {
            *drawn = eval_ctx.drawn;
        }
        Ok(value)
    }

    /// Evaluate to a BIGINT, NULL is rejected.
    pub fn eval_i64(&mut self, expr: &Expression) -> Result<i64> {
        let value = self.eval(expr)?;
        if value.is_null() {
            return Err(DbError::new_kind(ErrorKind::InvalidValue, "Value cannot be NULL")
                .with_field("expression", expr));
        }
        value.cast_to(DataType::Int64)?.try_as_i64()
    }

    pub fn check_right(&self, object: &ObjectKey, right: Right) -> Result<()> {
        self.database.check_right(self.user, object, right)
    }

    pub fn check_schema_owner(&self, schema: &str) -> Result<()> {
        self.database.check_schema_owner(self.user, schema)
    }

    /// Error if the statement was canceled or ran past its timeout.
    pub fn check_canceled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(DbError::new_kind(
                ErrorKind::StatementCanceled,
                "Statement was canceled",
            ));
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DbError::new_kind(
                    ErrorKind::StatementCanceled,
                    "Statement timed out",
                )
                .with_field("timeout_ms", timeout.as_millis()));
            }
        }
        Ok(())
    }

    /// Record a key generated by the current statement.
    ///
    /// Errors once the statement generates more keys than the session
    /// allows, failing the statement instead of dropping keys.
    pub fn push_generated_key(&mut self, key: i64) -> Result<()> {
        let limit = self.config.max_generated_keys;
        if self.generated_keys.len() as u64 >= limit {
            return Err(
                DbError::new_kind(ErrorKind::InvalidValue, "Too many generated keys")
                    .with_field("limit", limit),
            );
        }
        self.generated_keys.push(key);
        Ok(())
    }
}
