use ridgedb_error::Result;
use tracing::debug;

use super::context::ExecutionContext;
use super::procedure::recursive_call_error;
use super::{ExecuteCommand, ExecutionResult};
use crate::expr::{self, Expression};

/// EXECUTE name (args)
#[derive(Debug, Clone)]
pub struct ExecuteProcedure {
    name: String,
    arguments: Vec<Expression>,
}

impl ExecuteProcedure {
    pub fn new(name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        ExecuteProcedure {
            name: name.into(),
            arguments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ExecuteCommand for ExecuteProcedure {
    fn parameter_count(&self) -> usize {
        expr::parameter_count(&self.arguments)
    }

    /// Follows the procedure body, which the session resolves before
    /// execution.
    fn is_transactional(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        if ctx.procedure_stack.iter().any(|name| name == &self.name) {
            return Err(recursive_call_error(&self.name));
        }

        let mut arguments = Vec::with_capacity(self.arguments.len());
        for arg in &self.arguments {
            arguments.push(ctx.eval(arg)?);
        }

        let database = ctx.database;
        let procedure = ctx.procedures.require_mut(&self.name)?;
        let arguments = procedure.prepared().bind_arguments(arguments)?;

        let prepared = procedure.prepared_mut();
        if prepared.needs_prepare(database) {
            debug!(name = %self.name, "preparing procedure");
            prepared.prepare(database)?;
        }
        let command = prepared.command().clone();
        command.check_parameters(&arguments)?;

        let outer = std::mem::replace(&mut ctx.parameters, arguments);
        ctx.procedure_stack.push(self.name.clone());
        let result = command.execute(ctx);
        ctx.procedure_stack.pop();
        ctx.parameters = outer;

        result
    }
}
