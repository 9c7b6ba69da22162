use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ridgedb_error::{DbError, ErrorKind, Result};
use tracing::trace;

use super::result::ResultSet;
use super::session::{CancelHandle, Session};
use crate::command::{Command, ExecutionResult};
use crate::scalar::ScalarValue;

/// Client facing statement on a session.
///
/// Holds at most one open result set. Executing again, `more_results` or
/// closing the statement closes it.
#[derive(Debug)]
pub struct Statement<'a> {
    session: &'a mut Session,
    /// Zero means no timeout.
    query_timeout_secs: u64,
    update_count: Option<u64>,
    result: Option<ResultSet>,
    /// Open flag of the last result, kept after the cursor is handed out.
    result_open: Option<Arc<AtomicBool>>,
    closed: bool,
}

impl<'a> Statement<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Statement {
            session,
            query_timeout_secs: 0,
            update_count: None,
            result: None,
            result_open: None,
            closed: false,
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(DbError::new_kind(
                ErrorKind::ObjectClosed,
                "The statement is closed",
            ));
        }
        self.session.check_open()
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    /// Execute any command, true if it produced a result set.
    pub fn execute(&mut self, command: &Command, parameters: &[ScalarValue]) -> Result<bool> {
        self.check_open()?;
        self.close_result();

        let timeout = match self.query_timeout_secs {
            0 => self.session.config().query_timeout(),
            secs => Some(Duration::from_secs(secs)),
        };
        trace!(command = %command.name(), ?timeout, "statement execute");

        match self.session.execute_with_timeout(command, parameters, timeout)? {
            ExecutionResult::Query(result) => {
                let cursor = self.session.open_cursor(result);
                self.result_open = Some(cursor.open_flag());
                self.result = Some(cursor);
                Ok(true)
            }
            ExecutionResult::RowCount(count) => {
                self.update_count = Some(count);
                Ok(false)
            }
        }
    }

    /// Execute a command that doesn't return rows.
    pub fn execute_update(&mut self, command: &Command, parameters: &[ScalarValue]) -> Result<u64> {
        self.check_open()?;
        if self.session.describe(command)?.is_query {
            return Err(DbError::new_kind(
                ErrorKind::MethodNotAllowedForQuery,
                "Method is not allowed for a query",
            )
            .with_field("method", "execute_update"));
        }
        self.execute(command, parameters)?;
        Ok(self.update_count.unwrap_or(0))
    }

    /// Execute a query, returning its result set.
    pub fn execute_query(&mut self, command: &Command, parameters: &[ScalarValue]) -> Result<ResultSet> {
        self.check_open()?;
        if !self.session.describe(command)?.is_query {
            return Err(DbError::new_kind(
                ErrorKind::MethodOnlyAllowedForQuery,
                "Method is only allowed for a query",
            )
            .with_field("method", "execute_query"));
        }
        self.execute(command, parameters)?;
        self.result
            .take()
            .ok_or_else(|| DbError::new("Query did not produce a result set"))
    }

    /// Take the result set of the last execution.
    pub fn result_set(&mut self) -> Result<Option<ResultSet>> {
        self.check_open()?;
        Ok(self.result.take())
    }

    /// Row count of the last execution, None if it was a query or there
    /// are no more results.
    pub fn update_count(&self) -> Option<u64> {
        self.update_count
    }

    /// Move to the next result. Statements produce a single result, so this
    /// closes the current one and returns false.
    pub fn more_results(&mut self) -> Result<bool> {
        self.check_open()?;
        self.close_result();
        Ok(false)
    }

    pub fn generated_keys(&mut self) -> Result<ResultSet> {
        self.check_open()?;
        self.session.generated_keys()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.session.cancel_handle()
    }

    pub fn cancel(&self) {
        self.session.cancel_handle().cancel();
    }

    /// Set the timeout in seconds, 0 disables it.
    pub fn set_query_timeout(&mut self, secs: i64) -> Result<()> {
        self.check_open()?;
        let secs = u64::try_from(secs).map_err(|_| {
            DbError::new_kind(ErrorKind::InvalidValue, "Query timeout must not be negative")
                .with_field("timeout", secs)
        })?;
        self.query_timeout_secs = secs;
        Ok(())
    }

    pub fn query_timeout(&self) -> u64 {
        self.query_timeout_secs
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.close_result();
            self.closed = true;
        }
    }

    fn close_result(&mut self) {
        self.result = None;
        if let Some(open) = self.result_open.take() {
            open.store(false, Ordering::Release);
        }
        self.update_count = None;
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl Session {
    pub fn create_statement(&mut self) -> Result<Statement<'_>> {
        self.check_open()?;
        Ok(Statement::new(self))
    }
}
