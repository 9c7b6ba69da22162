use ridgedb_error::Result;
use tracing::debug;

use super::context::ExecutionContext;
use super::{ExecuteCommand, ExecutionResult};

/// DEALLOCATE [PLAN] name
///
/// Removing a missing procedure is not an error.
#[derive(Debug, Clone)]
pub struct Deallocate {
    name: String,
}

impl Deallocate {
    pub fn new(name: impl Into<String>) -> Self {
        Deallocate { name: name.into() }
    }
}

impl ExecuteCommand for Deallocate {
    fn is_transactional(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        let removed = ctx.procedures.remove(&self.name).is_some();
        debug!(name = %self.name, %removed, "deallocated procedure");
        Ok(ExecutionResult::RowCount(0))
    }
}
