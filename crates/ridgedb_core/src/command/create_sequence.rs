use ridgedb_error::Result;

use super::context::ExecutionContext;
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::ObjectKey;
use crate::catalog::create::CreateSequenceInfo;
use crate::catalog::sequence::Sequence;
use crate::expr;

#[derive(Debug, Clone)]
pub struct CreateSequence {
    pub info: CreateSequenceInfo,
}

impl CreateSequence {
    pub fn new(info: CreateSequenceInfo) -> Self {
        CreateSequence { info }
    }
}

impl ExecuteCommand for CreateSequence {
    fn parameter_count(&self) -> usize {
        expr::parameter_count(self.info.start.iter().chain(self.info.increment.iter()))
    }

    fn is_transactional(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        ctx.check_schema_owner(&self.info.schema)?;

        let start = match &self.info.start {
            Some(expr) => ctx.eval_i64(expr)?,
            None => 1,
        };
        let increment = match &self.info.increment {
            Some(expr) => ctx.eval_i64(expr)?,
            None => 1,
        };
        let cache_size = self
            .info
            .cache_size
            .unwrap_or(ctx.config.sequence_cache_size);

        let sequence = Sequence::try_new(
            ObjectKey::new(&self.info.schema, &self.info.name),
            start,
            increment,
            cache_size,
            false,
        )?;

        let database = ctx.database;
        database
            .system_session()
            .apply_and_commit(|tx| database.create_sequence(tx, sequence, self.info.on_conflict))?;

        Ok(ExecutionResult::RowCount(0))
    }
}
