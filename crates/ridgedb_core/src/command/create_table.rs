use std::sync::Arc;

use ridgedb_error::Result;
use uuid::Uuid;

use super::context::ExecutionContext;
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::ObjectKey;
use crate::catalog::create::CreateTableInfo;
use crate::catalog::sequence::Sequence;
use crate::catalog::table::Table;

/// Prefix of sequences created for identity columns.
pub const SYSTEM_SEQUENCE_PREFIX: &str = "SYSTEM_SEQUENCE_";

#[derive(Debug, Clone)]
pub struct CreateTable {
    pub info: CreateTableInfo,
}

impl CreateTable {
    pub fn new(info: CreateTableInfo) -> Self {
        CreateTable { info }
    }
}

impl ExecuteCommand for CreateTable {
    fn is_transactional(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        ctx.check_schema_owner(&self.info.schema)?;

        let mut sequences = Vec::new();
        for _ in self.info.columns.iter().filter(|c| c.identity) {
            let name = format!(
                "{SYSTEM_SEQUENCE_PREFIX}{}",
                Uuid::new_v4().simple().to_string().to_uppercase()
            );
            sequences.push(Arc::new(Sequence::try_new(
                ObjectKey::new(&self.info.schema, name),
                1,
                1,
                ctx.config.sequence_cache_size,
                true,
            )?));
        }

        let table = Table::new(
            ObjectKey::new(&self.info.schema, &self.info.name),
            &self.info.columns,
            sequences,
        )?;

        let database = ctx.database;
        database
            .system_session()
            .apply_and_commit(|tx| database.create_table(tx, table, self.info.on_conflict))?;

        Ok(ExecutionResult::RowCount(0))
    }
}
