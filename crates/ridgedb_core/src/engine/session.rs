use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ridgedb_error::{DbError, ErrorKind, Result};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::result::ResultSet;
use super::savepoint::{Savepoint, SavepointStack};
use crate::catalog::database::Database;
use crate::catalog::rights::User;
use crate::command::context::ExecutionContext;
use crate::command::procedure::{Procedure, ProcedureRegistry, recursive_call_error};
use crate::command::{Command, ExecutionResult, QueryResult};
use crate::config::session::SessionConfig;
use crate::scalar::ScalarValue;
use crate::storage::undo::UndoLog;

#[derive(Debug)]
struct Transaction {
    id: u64,
    undo: UndoLog,
}

/// How a statement interacts with the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementKind {
    pub is_query: bool,
    pub is_transactional: bool,
}

/// Cancels the statement currently running on a session.
///
/// May be used from any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// A connection's view of the database.
///
/// Owns the transaction, savepoints, procedures and generated keys. A
/// session runs one statement at a time.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    database: Arc<Database>,
    user: Arc<User>,
    config: SessionConfig,
    autocommit: bool,
    transaction: Option<Transaction>,
    savepoints: SavepointStack,
    procedures: ProcedureRegistry,
    /// Keys generated by the most recent statement.
    generated_keys: Vec<i64>,
    /// Open flags of cursors handed out for the most recent statement.
    open_cursors: Vec<Arc<AtomicBool>>,
    last_identity: Option<i64>,
    cancel: Arc<AtomicBool>,
    closed: bool,
}

impl Session {
    pub(crate) fn new(database: Arc<Database>, user: Arc<User>) -> Self {
        let id = Uuid::new_v4();
        debug!(%id, user = %user.name, "created session");
        Session {
            id,
            database,
            user,
            config: SessionConfig::default(),
            autocommit: true,
            transaction: None,
            savepoints: SavepointStack::default(),
            procedures: ProcedureRegistry::default(),
            generated_keys: Vec::new(),
            open_cursors: Vec::new(),
            last_identity: None,
            cancel: Arc::new(AtomicBool::new(false)),
            closed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_setting(&mut self, name: &str, value: impl Into<ScalarValue>) -> Result<()> {
        self.check_open()?;
        self.config.set_from_scalar(name, value.into())
    }

    pub fn get_setting(&self, name: &str) -> Result<ScalarValue> {
        self.config.get_as_scalar(name)
    }

    pub fn reset_setting(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        self.config.reset(name)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(DbError::new_kind(
                ErrorKind::ObjectClosed,
                "The session is closed",
            ));
        }
        Ok(())
    }

    pub fn auto_commit(&self) -> bool {
        self.autocommit
    }

    /// Switch autocommit mode. Enabling it commits the open transaction.
    pub fn set_auto_commit(&mut self, autocommit: bool) -> Result<()> {
        self.check_open()?;
        if autocommit && !self.autocommit {
            self.end_transaction(true);
        }
        self.autocommit = autocommit;
        Ok(())
    }

    /// Id of the open transaction.
    pub fn transaction_id(&self) -> Option<u64> {
        self.transaction.as_ref().map(|tx| tx.id)
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Value returned by IDENTITY().
    pub fn last_identity(&self) -> Option<i64> {
        self.last_identity
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancel.clone(),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        self.end_transaction(true);
        self.generated_keys.clear();
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        self.end_transaction(false);
        self.generated_keys.clear();
        Ok(())
    }

    /// Set a savepoint in the current transaction.
    pub fn set_savepoint(&mut self, name: Option<&str>) -> Result<Savepoint> {
        self.check_open()?;
        if self.autocommit {
            return Err(DbError::new_kind(
                ErrorKind::InvalidState,
                "Savepoints require autocommit to be disabled",
            ));
        }
        let position = self.begin_transaction().undo.position();
        let savepoint = self.savepoints.push(name, position);
        debug!(session = %self.id, ?name, %position, "set savepoint");
        Ok(savepoint)
    }

    /// Undo everything done after the savepoint was set.
    ///
    /// The savepoint and every later one become invalid.
    pub fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.check_open()?;
        let position = self.savepoints.rollback_to(savepoint)?;
        if let Some(tx) = self.transaction.as_mut() {
            let undone = tx.undo.rollback_to(position);
            debug!(session = %self.id, %position, %undone, "rolled back to savepoint");
        }
        Ok(())
    }

    pub fn release_savepoint(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.check_open()?;
        self.savepoints.release(savepoint)?;
        debug!(session = %self.id, "released savepoint");
        Ok(())
    }

    /// Determine how a command will run without running it.
    pub fn describe(&self, command: &Command) -> Result<StatementKind> {
        // Follow procedure bodies down to the command that actually runs.
        let mut command = command;
        let mut visited: Vec<&str> = Vec::new();
        while let Command::ExecuteProcedure(exec) = command {
            if visited.contains(&exec.name()) {
                return Err(recursive_call_error(exec.name()));
            }
            visited.push(exec.name());
            command = self.procedures.require(exec.name())?.prepared().command();
        }
        Ok(StatementKind {
            is_query: command.is_query(),
            is_transactional: command.is_transactional(),
        })
    }

    /// Execute a bound command with the session's configured timeout.
    pub fn execute(&mut self, command: &Command, parameters: &[ScalarValue]) -> Result<ExecutionResult> {
        let timeout = self.config.query_timeout();
        self.execute_with_timeout(command, parameters, timeout)
    }

    /// Execute a bound command.
    ///
    /// A failing statement undoes its own row changes and leaves the rest of
    /// the transaction intact. Catalog changes committed through the system
    /// session are kept.
    pub fn execute_with_timeout(
        &mut self,
        command: &Command,
        parameters: &[ScalarValue],
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult> {
        self.check_open()?;
        self.close_cursors();

        let kind = self.describe(command)?;
        command.check_parameters(parameters)?;

        self.cancel.store(false, Ordering::Relaxed);
        let deadline = timeout.map(|t| (Instant::now() + t, t));

        self.begin_transaction();
        let Some(tx) = self.transaction.as_mut() else {
            return Err(DbError::new("Missing transaction after begin"));
        };
        let statement_start = tx.undo.position();

        trace!(session = %self.id, command = %command.name(), "executing statement");

        let mut ctx = ExecutionContext {
            database: &self.database,
            user: &self.user,
            config: &self.config,
            parameters: parameters.to_vec(),
            undo: &mut tx.undo,
            procedures: &mut self.procedures,
            last_identity: &mut self.last_identity,
            generated_keys: Vec::new(),
            procedure_stack: Vec::new(),
            deadline,
            cancel: &self.cancel,
        };
        let result = command.execute(&mut ctx);
        let generated_keys = std::mem::take(&mut ctx.generated_keys);

        match result {
            Ok(result) => {
                self.generated_keys = generated_keys;
                if self.autocommit || !kind.is_transactional {
                    // Autocommit doesn't count as an explicit commit, keys
                    // stay available.
                    self.end_transaction(true);
                }
                Ok(result)
            }
            Err(e) => {
                if e.kind() == ErrorKind::StatementCanceled {
                    warn!(session = %self.id, command = %command.name(), %e, "statement canceled");
                } else {
                    debug!(session = %self.id, command = %command.name(), %e, "statement failed");
                }
                if let Some(tx) = self.transaction.as_mut() {
                    tx.undo.rollback_to(statement_start);
                }
                if self.autocommit {
                    self.end_transaction(false);
                }
                self.generated_keys.clear();
                Err(e)
            }
        }
    }

    /// Cursor over the keys generated by the most recent statement.
    pub fn generated_keys(&mut self) -> Result<ResultSet> {
        self.check_open()?;
        let rows = self
            .generated_keys
            .iter()
            .map(|k| vec![ScalarValue::Int64(*k)])
            .collect();
        Ok(self.open_cursor(QueryResult {
            columns: vec!["KEY".to_string()],
            rows,
        }))
    }

    pub(crate) fn open_cursor(&mut self, result: QueryResult) -> ResultSet {
        let open = Arc::new(AtomicBool::new(true));
        self.open_cursors.push(open.clone());
        ResultSet::new(result, open)
    }

    /// Close every cursor handed out for the previous statement.
    pub(crate) fn close_cursors(&mut self) {
        for open in self.open_cursors.drain(..) {
            open.store(false, Ordering::Release);
        }
    }

    /// Roll back, drop procedures and close cursors.
    ///
    /// Closing a closed session is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.end_transaction(false);
        self.close_cursors();
        self.procedures.clear();
        self.generated_keys.clear();
        self.closed = true;
        debug!(session = %self.id, "closed session");
        Ok(())
    }

    fn begin_transaction(&mut self) -> &mut Transaction {
        let database = &self.database;
        let session = self.id;
        self.transaction.get_or_insert_with(|| {
            let id = database.next_transaction_id();
            trace!(%session, transaction = %id, "began transaction");
            Transaction {
                id,
                undo: UndoLog::default(),
            }
        })
    }

    /// Commit or roll back the open transaction, invalidating savepoints.
    fn end_transaction(&mut self, commit: bool) {
        self.savepoints.clear();
        let Some(mut tx) = self.transaction.take() else {
            return;
        };
        if commit {
            tx.undo.clear();
            trace!(session = %self.id, transaction = %tx.id, "committed transaction");
        } else {
            let undone = tx.undo.rollback_to(0);
            debug!(session = %self.id, transaction = %tx.id, %undone, "rolled back transaction");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(session = %self.id, %e, "failed to close session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::create::{ColumnDefinition, CreateTableInfo, OnConflict};
    use crate::command::create_table::CreateTable;
    use crate::command::insert::Insert;
    use crate::command::select::Select;
    use crate::config::database::DatabaseConfig;
    use crate::expr::Expression;
    use crate::scalar::DataType;

    fn setup() -> Session {
        logutil::init_test();
        let db = Database::new(DatabaseConfig::default()).unwrap();
        let mut session = db.new_session("SA").unwrap();
        let create = Command::from(CreateTable::new(CreateTableInfo {
            schema: "PUBLIC".to_string(),
            name: "T".to_string(),
            columns: vec![
                ColumnDefinition::identity("ID"),
                ColumnDefinition::new("X", DataType::Int32),
            ],
            on_conflict: OnConflict::Error,
        }));
        session.execute(&create, &[]).unwrap();
        session
    }

    fn insert(session: &Session, x: i32) -> Command {
        let table = session.database().require_table("PUBLIC", "T").unwrap();
        Insert::try_new(&table, ["X"], vec![vec![Expression::lit(x)]])
            .unwrap()
            .into()
    }

    fn row_count(session: &Session) -> usize {
        session
            .database()
            .require_table("PUBLIC", "T")
            .unwrap()
            .storage()
            .row_count()
    }

    #[test]
    fn savepoint_requires_transaction_mode() {
        let mut session = setup();
        let err = session.set_savepoint(None).unwrap_err();
        assert_eq!(ErrorKind::InvalidState, err.kind());
    }

    #[test]
    fn rollback_to_savepoint_keeps_earlier_rows() {
        let mut session = setup();
        session.set_auto_commit(false).unwrap();

        let cmd = insert(&session, 1);
        session.execute(&cmd, &[]).unwrap();
        let sp = session.set_savepoint(Some("S1")).unwrap();
        let cmd = insert(&session, 2);
        session.execute(&cmd, &[]).unwrap();
        assert_eq!(2, row_count(&session));

        session.rollback_to_savepoint(&sp).unwrap();
        assert_eq!(1, row_count(&session));
        assert!(session.in_transaction());

        let err = session.release_savepoint(&sp).unwrap_err();
        assert_eq!(ErrorKind::SavepointInvalid, err.kind());

        session.commit().unwrap();
        assert!(!session.in_transaction());
        assert_eq!(1, row_count(&session));
    }

    #[test]
    fn failed_statement_undoes_only_itself() {
        let mut session = setup();
        session.set_auto_commit(false).unwrap();

        let cmd = insert(&session, 1);
        session.execute(&cmd, &[]).unwrap();

        let table = session.database().require_table("PUBLIC", "T").unwrap();
        let bad: Command = Insert::try_new(
            &table,
            ["X"],
            vec![vec![Expression::lit(2)], vec![Expression::lit("nope")]],
        )
        .unwrap()
        .into();
        let err = session.execute(&bad, &[]).unwrap_err();
        assert_eq!(ErrorKind::EvaluationError, err.kind());

        assert_eq!(1, row_count(&session));
        assert!(session.in_transaction());
    }

    #[test]
    fn enabling_autocommit_commits() {
        let mut session = setup();
        session.set_auto_commit(false).unwrap();
        let cmd = insert(&session, 1);
        session.execute(&cmd, &[]).unwrap();
        let tx = session.transaction_id();
        assert!(tx.is_some());

        session.set_auto_commit(true).unwrap();
        assert!(!session.in_transaction());
        session.rollback().unwrap();
        assert_eq!(1, row_count(&session));
    }

    #[test]
    fn close_rolls_back() {
        let mut session = setup();
        session.set_auto_commit(false).unwrap();
        let cmd = insert(&session, 1);
        session.execute(&cmd, &[]).unwrap();
        let db = session.database().clone();

        session.close().unwrap();
        assert_eq!(0, db.require_table("PUBLIC", "T").unwrap().storage().row_count());

        let select: Command = Select::values(vec![("V", Expression::lit(1))]).into();
        let err = session.execute(&select, &[]).unwrap_err();
        assert_eq!(ErrorKind::ObjectClosed, err.kind());
    }

    #[test]
    fn too_many_generated_keys_fails_statement() {
        let mut session = setup();
        session.set_setting("max_generated_keys", 2_i64).unwrap();
        let table = session.database().require_table("PUBLIC", "T").unwrap();
        let rows = |n: i32| -> Command {
            Insert::try_new(&table, ["X"], (0..n).map(|x| vec![Expression::lit(x)]).collect())
                .unwrap()
                .into()
        };

        let err = session.execute(&rows(3), &[]).unwrap_err();
        assert_eq!(ErrorKind::InvalidValue, err.kind());
        assert_eq!(0, row_count(&session));

        session.execute(&rows(2), &[]).unwrap();
        assert_eq!(2, row_count(&session));
        assert_eq!(2, session.generated_keys().unwrap().collect_i64().unwrap().len());
    }

    #[test]
    fn keys_cursor_closed_by_next_statement() {
        let mut session = setup();
        let cmd = insert(&session, 1);
        session.execute(&cmd, &[]).unwrap();

        let mut keys = session.generated_keys().unwrap();
        session.execute(&cmd, &[]).unwrap();
        assert_eq!(ErrorKind::ObjectClosed, keys.next().unwrap_err().kind());

        assert_eq!(vec![2], session.generated_keys().unwrap().collect_i64().unwrap());
        assert_eq!(Some(2), session.last_identity());
    }
}
