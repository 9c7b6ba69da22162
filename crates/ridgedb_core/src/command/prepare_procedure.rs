use ridgedb_error::Result;
use tracing::debug;

use super::context::ExecutionContext;
use super::procedure::{Parameter, Prepared, Procedure};
use super::{Command, ExecuteCommand, ExecutionResult};
use crate::scalar::ScalarValue;

/// PREPARE name [(types)] AS statement
#[derive(Debug, Clone)]
pub struct PrepareProcedure {
    name: String,
    template: Box<Command>,
    parameters: Vec<Parameter>,
    prepare_always: bool,
}

impl PrepareProcedure {
    pub fn new(name: impl Into<String>, template: impl Into<Command>) -> Self {
        PrepareProcedure {
            name: name.into(),
            template: Box::new(template.into()),
            parameters: Vec::new(),
            prepare_always: false,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_prepare_always(mut self, prepare_always: bool) -> Self {
        self.prepare_always = prepare_always;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ExecuteCommand for PrepareProcedure {
    /// Parameters are checked when the procedure is executed.
    fn check_parameters(&self, _parameters: &[ScalarValue]) -> Result<()> {
        Ok(())
    }

    fn is_transactional(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        let mut prepared = Prepared::new((*self.template).clone());
        prepared.set_parameter_list(self.parameters.clone());
        prepared.set_prepare_always(self.prepare_always);
        prepared.prepare(ctx.database)?;

        ctx.procedures
            .register(Procedure::new(&self.name, prepared));
        debug!(name = %self.name, template = %self.template.name(), "registered procedure");

        Ok(ExecutionResult::RowCount(0))
    }
}
