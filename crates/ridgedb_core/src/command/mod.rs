//! Bound statements ready for execution.
//!
//! Every statement is one `Command` variant. Variants share the
//! `ExecuteCommand` interface and `Command` dispatches to them by matching.
pub mod alter_sequence;
pub mod context;
pub mod create_sequence;
pub mod create_table;
pub mod deallocate;
pub mod delete;
pub mod dml;
pub mod drop;
pub mod execute_procedure;
pub mod grant;
pub mod insert;
pub mod merge;
pub mod prepare_procedure;
pub mod procedure;
pub mod select;
pub mod update;

use std::fmt::Debug;

use ridgedb_error::{DbError, ErrorKind, Result};

use self::alter_sequence::AlterSequence;
use self::context::ExecutionContext;
use self::create_sequence::CreateSequence;
use self::create_table::CreateTable;
use self::deallocate::Deallocate;
use self::delete::Delete;
use self::drop::DropCommand;
use self::execute_procedure::ExecuteProcedure;
use self::grant::Grant;
use self::insert::Insert;
use self::merge::Merge;
use self::prepare_procedure::PrepareProcedure;
use self::select::Select;
use self::update::Update;
use crate::catalog::database::Database;
use crate::scalar::ScalarValue;
use crate::storage::Row;

/// Rows produced by a query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Number of affected rows. DDL reports 0.
    RowCount(u64),
    Query(QueryResult),
}

impl ExecutionResult {
    pub fn row_count(&self) -> Option<u64> {
        match self {
            Self::RowCount(n) => Some(*n),
            Self::Query(_) => None,
        }
    }
}

/// Interface shared by every command.
pub trait ExecuteCommand: Debug {
    /// Parameter slots referenced by the command.
    fn parameter_count(&self) -> usize {
        0
    }

    /// Validate the bound parameters.
    fn check_parameters(&self, parameters: &[ScalarValue]) -> Result<()> {
        check_parameter_count(self.parameter_count(), parameters.len())
    }

    /// Transactional commands run inside the caller's transaction. All
    /// others commit it once they succeed.
    fn is_transactional(&self) -> bool;

    fn is_query(&self) -> bool {
        false
    }

    /// Re-resolve catalog references by name.
    fn rebind(&mut self, _database: &Database) -> Result<()> {
        Ok(())
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult>;
}

pub(crate) fn check_parameter_count(expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(
            DbError::new_kind(ErrorKind::ParameterNotSet, "Parameter not set")
                .with_field("parameter", format!("#{}", actual + 1)),
        );
    }
    if actual > expected {
        return Err(DbError::new_kind(
            ErrorKind::ParameterCountMismatch,
            "Too many parameters",
        )
        .with_field("expected", expected)
        .with_field("actual", actual));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub enum Command {
    AlterSequence(AlterSequence),
    CreateSequence(CreateSequence),
    CreateTable(CreateTable),
    Drop(DropCommand),
    Insert(Insert),
    Merge(Merge),
    Update(Update),
    Delete(Delete),
    Select(Select),
    Grant(Grant),
    PrepareProcedure(PrepareProcedure),
    ExecuteProcedure(ExecuteProcedure),
    Deallocate(Deallocate),
}

impl Command {
    fn inner(&self) -> &dyn ExecuteCommand {
        match self {
            Self::AlterSequence(c) => c,
            Self::CreateSequence(c) => c,
            Self::CreateTable(c) => c,
            Self::Drop(c) => c,
            Self::Insert(c) => c,
            Self::Merge(c) => c,
            Self::Update(c) => c,
            Self::Delete(c) => c,
            Self::Select(c) => c,
            Self::Grant(c) => c,
            Self::PrepareProcedure(c) => c,
            Self::ExecuteProcedure(c) => c,
            Self::Deallocate(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ExecuteCommand {
        match self {
            Self::AlterSequence(c) => c,
            Self::CreateSequence(c) => c,
            Self::CreateTable(c) => c,
            Self::Drop(c) => c,
            Self::Insert(c) => c,
            Self::Merge(c) => c,
            Self::Update(c) => c,
            Self::Delete(c) => c,
            Self::Select(c) => c,
            Self::Grant(c) => c,
            Self::PrepareProcedure(c) => c,
            Self::ExecuteProcedure(c) => c,
            Self::Deallocate(c) => c,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.inner().parameter_count()
    }

    pub fn check_parameters(&self, parameters: &[ScalarValue]) -> Result<()> {
        self.inner().check_parameters(parameters)
    }

    pub fn is_transactional(&self) -> bool {
        self.inner().is_transactional()
    }

    pub fn is_query(&self) -> bool {
        self.inner().is_query()
    }

    pub fn rebind(&mut self, database: &Database) -> Result<()> {
        self.inner_mut().rebind(database)
    }

    pub fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        self.inner().execute(ctx)
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AlterSequence(_) => "ALTER SEQUENCE",
            Self::CreateSequence(_) => "CREATE SEQUENCE",
            Self::CreateTable(_) => "CREATE TABLE",
            Self::Drop(_) => "DROP",
            Self::Insert(_) => "INSERT",
            Self::Merge(_) => "MERGE",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
            Self::Select(_) => "SELECT",
            Self::Grant(_) => "GRANT",
            Self::PrepareProcedure(_) => "PREPARE",
            Self::ExecuteProcedure(_) => "EXECUTE",
            Self::Deallocate(_) => "DEALLOCATE",
        }
    }
}

macro_rules! impl_from_command {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Command {
                fn from(value: $variant) -> Self {
                    Command::$variant(value)
                }
            }
        )*
    };
}

impl_from_command!(
    AlterSequence,
    CreateSequence,
    CreateTable,
    Insert,
    Merge,
    Update,
    Delete,
    Select,
    Grant,
    PrepareProcedure,
    ExecuteProcedure,
    Deallocate,
);

impl From<DropCommand> for Command {
    fn from(value: DropCommand) -> Self {
        Command::Drop(value)
    }
}
