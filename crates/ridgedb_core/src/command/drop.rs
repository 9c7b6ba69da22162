use ridgedb_error::{DbError, ErrorKind, Result};

use super::context::ExecutionContext;
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::ObjectKey;
use crate::catalog::drop::{DropInfo, DropObject};

/// DROP TABLE / DROP SEQUENCE [IF EXISTS]
#[derive(Debug, Clone)]
pub struct DropCommand {
    pub info: DropInfo,
}

impl DropCommand {
    pub fn new(info: DropInfo) -> Self {
        DropCommand { info }
    }
}

impl ExecuteCommand for DropCommand {
    fn is_transactional(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        let info = &self.info;
        ctx.check_schema_owner(&info.schema)?;

        let database = ctx.database;
        let found = database.system_session().apply_and_commit(|tx| {
            Ok(match info.object {
                DropObject::Table => database
                    .drop_table(tx, &info.schema, &info.name)?
                    .is_some(),
                DropObject::Sequence => database
                    .drop_sequence(tx, &info.schema, &info.name)?
                    .is_some(),
            })
        })?;

        if !found && !info.if_exists {
            return Err(DbError::new_kind(
                ErrorKind::ObjectNotFound,
                format!("Missing {} to drop", info.object),
            )
            .with_field("name", ObjectKey::new(&info.schema, &info.name)));
        }

        Ok(ExecutionResult::RowCount(0))
    }
}
