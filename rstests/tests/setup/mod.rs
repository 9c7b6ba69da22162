#![allow(dead_code)]

use std::sync::Arc;

use ridgedb_core::catalog::create::{ColumnDefinition, CreateTableInfo, OnConflict};
use ridgedb_core::catalog::database::Database;
use ridgedb_core::catalog::table::Table;
use ridgedb_core::command::Command;
use ridgedb_core::command::create_table::CreateTable;
use ridgedb_core::command::insert::Insert;
use ridgedb_core::command::select::Select;
use ridgedb_core::config::database::DatabaseConfig;
use ridgedb_core::engine::session::Session;
use ridgedb_core::expr::Expression;
use ridgedb_core::scalar::DataType;

pub fn open() -> Arc<Database> {
    logutil::init_test();
    Database::new(DatabaseConfig::default()).unwrap()
}

pub fn admin(db: &Arc<Database>) -> Session {
    db.new_session("SA").unwrap()
}

/// Create `PUBLIC.<name>(ID BIGINT IDENTITY, X INT)`.
pub fn create_identity_table(session: &mut Session, name: &str) -> Arc<Table> {
    let create = Command::from(CreateTable::new(CreateTableInfo {
        schema: "PUBLIC".to_string(),
        name: name.to_string(),
        columns: vec![
            ColumnDefinition::identity("ID"),
            ColumnDefinition::new("X", DataType::Int32),
        ],
        on_conflict: OnConflict::Error,
    }));
    session.execute(&create, &[]).unwrap();
    session.database().require_table("PUBLIC", name).unwrap()
}

pub fn insert_x(table: &Arc<Table>, values: &[i32]) -> Command {
    let rows = values.iter().map(|v| vec![Expression::lit(*v)]).collect();
    Insert::try_new(table, ["X"], rows).unwrap().into()
}

/// Values of column X, in insertion order.
pub fn select_x(session: &mut Session, table: &Arc<Table>) -> Vec<i64> {
    let select: Command = Select::from_table(table, ["X"], None).unwrap().into();
    let mut stmt = session.create_statement().unwrap();
    stmt.execute_query(&select, &[]).unwrap().collect_i64().unwrap()
}
