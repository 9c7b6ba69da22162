use std::sync::Arc;

use ridgedb_error::Result;
use tracing::info;

use super::context::ExecutionContext;
use super::{ExecuteCommand, ExecutionResult};
use crate::catalog::rights::Right;
use crate::catalog::table::Table;

/// GRANT rights ON table TO user, or REVOKE rights ON table FROM user.
#[derive(Debug, Clone)]
pub struct Grant {
    table: Arc<Table>,
    grantee: String,
    rights: Right,
    revoke: bool,
}

impl Grant {
    pub fn grant(table: &Arc<Table>, rights: Right, grantee: impl Into<String>) -> Self {
        Grant {
            table: table.clone(),
            grantee: grantee.into(),
            rights,
            revoke: false,
        }
    }

    pub fn revoke(table: &Arc<Table>, rights: Right, grantee: impl Into<String>) -> Self {
        Grant {
            revoke: true,
            ..Self::grant(table, rights, grantee)
        }
    }
}

impl ExecuteCommand for Grant {
    fn is_transactional(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<ExecutionResult> {
        let key = self.table.key();
        ctx.check_schema_owner(&key.schema)?;

        let database = ctx.database;
        let held = database.system_session().apply_and_commit(|tx| {
            database.set_rights(tx, &self.grantee, key, self.rights, self.revoke)
        })?;

        info!(
            grantee = %self.grantee,
            object = %key,
            rights = %self.rights,
            revoke = %self.revoke,
            %held,
            "changed rights"
        );

        Ok(ExecutionResult::RowCount(0))
    }
}
