//! Prepared statement templates and the session's procedure namespace.
use std::collections::HashMap;

use ridgedb_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::Command;
use crate::catalog::database::Database;
use crate::scalar::{DataType, ScalarValue};

/// A declared procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Parameter {
    /// Arguments are cast to this type when set.
    pub datatype: Option<DataType>,
}

impl Parameter {
    pub fn typed(datatype: DataType) -> Self {
        Parameter {
            datatype: Some(datatype),
        }
    }
}

/// A bound statement that may be executed repeatedly.
#[derive(Debug, Clone)]
pub struct Prepared {
    command: Command,
    parameters: Vec<Parameter>,
    prepare_always: bool,
    /// Schema version the command was last bound against.
    prepared_version: Option<u64>,
}

impl Prepared {
    pub fn new(command: Command) -> Self {
        Prepared {
            command,
            parameters: Vec::new(),
            prepare_always: false,
            prepared_version: None,
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn set_parameter_list(&mut self, parameters: Vec<Parameter>) {
        self.parameters = parameters;
    }

    pub fn parameter_list(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn set_prepare_always(&mut self, prepare_always: bool) {
        self.prepare_always = prepare_always;
    }

    pub fn prepare_always(&self) -> bool {
        self.prepare_always
    }

    /// Number of arguments an invocation must provide.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len().max(self.command.parameter_count())
    }

    /// Whether the template must be bound again before running.
    pub fn needs_prepare(&self, database: &Database) -> bool {
        self.prepare_always || self.prepared_version != Some(database.schema_version())
    }

    /// Bind the template against the current catalog.
    pub fn prepare(&mut self, database: &Database) -> Result<()> {
        self.command.rebind(database)?;
        self.prepared_version = Some(database.schema_version());
        Ok(())
    }

    /// Cast arguments to the declared parameter types.
    pub fn bind_arguments(&self, arguments: Vec<ScalarValue>) -> Result<Vec<ScalarValue>> {
        let expected = self.parameter_count();
        if arguments.len() != expected {
            return Err(DbError::new_kind(
                ErrorKind::ParameterCountMismatch,
                "Wrong number of arguments",
            )
            .with_field("expected", expected)
            .with_field("actual", arguments.len()));
        }

        arguments
            .into_iter()
            .enumerate()
            .map(|(idx, arg)| match self.parameters.get(idx).and_then(|p| p.datatype) {
                Some(datatype) => arg.cast_to(datatype),
                None => Ok(arg),
            })
            .collect()
    }
}

/// Error for a procedure reached again through its own body.
pub(crate) fn recursive_call_error(name: &str) -> DbError {
    DbError::new_kind(ErrorKind::InvalidState, "Recursive procedure call")
        .with_field("procedure", name.to_string())
}

/// A named prepared statement.
#[derive(Debug, Clone)]
pub struct Procedure {
    name: String,
    prepared: Prepared,
}

impl Procedure {
    pub fn new(name: impl Into<String>, prepared: Prepared) -> Self {
        Procedure {
            name: name.into(),
            prepared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prepared(&self) -> &Prepared {
        &self.prepared
    }

    pub fn prepared_mut(&mut self) -> &mut Prepared {
        &mut self.prepared
    }
}

/// Session scoped procedure namespace.
#[derive(Debug, Default)]
pub struct ProcedureRegistry {
    procedures: HashMap<String, Procedure>,
}

impl ProcedureRegistry {
    /// Register a procedure, replacing any with the same name.
    pub fn register(&mut self, procedure: Procedure) -> Option<Procedure> {
        let replaced = self
            .procedures
            .insert(procedure.name.clone(), procedure);
        if let Some(old) = &replaced {
            debug!(name = %old.name, "replaced procedure");
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Procedure> {
        self.procedures.get(name).ok_or_else(|| procedure_not_found(name))
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut Procedure> {
        self.procedures
            .get_mut(name)
            .ok_or_else(|| procedure_not_found(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Procedure> {
        self.procedures.remove(name)
    }

    pub fn clear(&mut self) {
        self.procedures.clear();
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

fn procedure_not_found(name: &str) -> DbError {
    DbError::new_kind(ErrorKind::ProcedureNotFound, "Procedure not found").with_field("name", name)
}
