mod setup;

use ridgedb_core::command::Command;
use ridgedb_core::command::deallocate::Deallocate;
use ridgedb_core::command::select::Select;
use ridgedb_core::expr::Expression;
use ridgedb_error::ErrorKind;

use crate::setup::{admin, create_identity_table, insert_x, open, select_x};

#[test]
fn rollback_to_savepoint_then_release_is_invalid() {
    let db = open();
    let mut session = admin(&db);
    let table = create_identity_table(&mut session, "T");
    session.set_auto_commit(false).unwrap();

    session.execute(&insert_x(&table, &[1]), &[]).unwrap();
    let sp1 = session.set_savepoint(Some("SP1")).unwrap();
    session.execute(&insert_x(&table, &[2]), &[]).unwrap();
    let sp2 = session.set_savepoint(None).unwrap();
    session.execute(&insert_x(&table, &[3]), &[]).unwrap();

    session.rollback_to_savepoint(&sp1).unwrap();
    assert_eq!(vec![1], select_x(&mut session, &table));

    let err = session.release_savepoint(&sp1).unwrap_err();
    assert_eq!(ErrorKind::SavepointInvalid, err.kind());
    let err = session.rollback_to_savepoint(&sp2).unwrap_err();
    assert_eq!(ErrorKind::SavepointInvalid, err.kind());

    session.commit().unwrap();
    assert_eq!(vec![1], select_x(&mut session, &table));
}

#[test]
fn rollback_to_middle_savepoint_keeps_earlier_one() {
    let db = open();
    let mut session = admin(&db);
    let table = create_identity_table(&mut session, "T");
    session.set_auto_commit(false).unwrap();

    let sp1 = session.set_savepoint(None).unwrap();
    session.execute(&insert_x(&table, &[1]), &[]).unwrap();
    let sp2 = session.set_savepoint(None).unwrap();
    session.execute(&insert_x(&table, &[2]), &[]).unwrap();

    session.rollback_to_savepoint(&sp2).unwrap();
    assert_eq!(vec![1], select_x(&mut session, &table));
    assert!(sp1.is_valid());

    session.rollback_to_savepoint(&sp1).unwrap();
    assert!(select_x(&mut session, &table).is_empty());
}

#[test]
fn commit_invalidates_savepoints() {
    let db = open();
    let mut session = admin(&db);
    session.set_auto_commit(false).unwrap();

    let sp = session.set_savepoint(Some("S")).unwrap();
    session.commit().unwrap();
    assert_eq!(ErrorKind::SavepointInvalid, sp.name().unwrap_err().kind());
}

#[test]
fn close_rolls_back_open_transaction() {
    let db = open();
    let mut session = admin(&db);
    let table = create_identity_table(&mut session, "T");
    session.set_auto_commit(false).unwrap();
    session.execute(&insert_x(&table, &[1, 2]), &[]).unwrap();
    session.close().unwrap();

    let mut other = admin(&db);
    assert!(select_x(&mut other, &table).is_empty());

    let err = session.commit().unwrap_err();
    assert_eq!(ErrorKind::ObjectClosed, err.kind());
}

#[test]
fn dropping_session_rolls_back() {
    let db = open();
    let table = {
        let mut session = admin(&db);
        let table = create_identity_table(&mut session, "T");
        session.set_auto_commit(false).unwrap();
        session.execute(&insert_x(&table, &[1]), &[]).unwrap();
        table
    };
    assert_eq!(0, table.storage().row_count());
}

#[test]
fn statement_kind_mismatch() {
    let db = open();
    let mut session = admin(&db);
    let mut stmt = session.create_statement().unwrap();

    let query: Command = Select::values(vec![("V", Expression::lit(1))]).into();
    let err = stmt.execute_update(&query, &[]).unwrap_err();
    assert_eq!(ErrorKind::MethodNotAllowedForQuery, err.kind());

    let update: Command = Deallocate::new("NOPE").into();
    let err = stmt.execute_query(&update, &[]).unwrap_err();
    assert_eq!(ErrorKind::MethodOnlyAllowedForQuery, err.kind());
}

#[test]
fn negative_query_timeout() {
    let db = open();
    let mut session = admin(&db);
    let mut stmt = session.create_statement().unwrap();

    let err = stmt.set_query_timeout(-5).unwrap_err();
    assert_eq!(ErrorKind::InvalidValue, err.kind());
    assert_eq!(0, stmt.query_timeout());
    drop(stmt);

    let err = session.set_setting("query_timeout_ms", -1_i64).unwrap_err();
    assert_eq!(ErrorKind::InvalidValue, err.kind());
}

#[test]
fn result_set_closed_by_statement_close() {
    let db = open();
    let mut session = admin(&db);
    let table = create_identity_table(&mut session, "T");
    session.execute(&insert_x(&table, &[1]), &[]).unwrap();

    let mut stmt = session.create_statement().unwrap();
    let select: Command = Select::values(vec![("V", Expression::lit(1))]).into();
    stmt.execute(&select, &[]).unwrap();
    let mut keys = stmt.generated_keys().unwrap();
    stmt.close();

    // Generated keys belong to the session, the next statement closes them.
    assert!(!keys.next().unwrap());
    drop(stmt);
    session.execute(&select, &[]).unwrap();
    assert_eq!(ErrorKind::ObjectClosed, keys.next().unwrap_err().kind());
}
