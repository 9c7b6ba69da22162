mod setup;

use ridgedb_core::catalog::rights::Right;
use ridgedb_core::catalog::system_session::grant_storage_key;
use ridgedb_core::command::Command;
use ridgedb_core::command::alter_sequence::{AlterSequence, Restart};
use ridgedb_core::command::grant::Grant;
use ridgedb_core::command::select::Select;
use ridgedb_core::expr::Expression;
use ridgedb_error::ErrorKind;

use crate::setup::{admin, create_identity_table, insert_x, open};

#[test]
fn grant_and_revoke() {
    let db = open();
    let mut sa = admin(&db);
    let table = create_identity_table(&mut sa, "T");
    db.create_user("ALICE", false).unwrap();
    let mut alice = db.new_session("ALICE").unwrap();

    let err = alice.execute(&insert_x(&table, &[1]), &[]).unwrap_err();
    assert_eq!(ErrorKind::PermissionDenied, err.kind());
    assert_eq!(0, table.storage().row_count());

    sa.execute(&Grant::grant(&table, Right::INSERT, "ALICE").into(), &[])
        .unwrap();
    assert!(
        db.persisted_record(&grant_storage_key("ALICE", table.key()))
            .unwrap()
            .is_some()
    );

    alice.execute(&insert_x(&table, &[1]), &[]).unwrap();
    assert_eq!(vec![1], alice.generated_keys().unwrap().collect_i64().unwrap());

    let select: Command = Select::from_table(&table, ["X"], None).unwrap().into();
    let err = alice.execute(&select, &[]).unwrap_err();
    assert_eq!(ErrorKind::PermissionDenied, err.kind());

    sa.execute(&Grant::revoke(&table, Right::INSERT, "ALICE").into(), &[])
        .unwrap();
    assert!(
        db.persisted_record(&grant_storage_key("ALICE", table.key()))
            .unwrap()
            .is_none()
    );
    let err = alice.execute(&insert_x(&table, &[2]), &[]).unwrap_err();
    assert_eq!(ErrorKind::PermissionDenied, err.kind());
}

#[test]
fn only_owner_grants() {
    let db = open();
    let mut sa = admin(&db);
    let table = create_identity_table(&mut sa, "T");
    db.create_user("ALICE", false).unwrap();
    let mut alice = db.new_session("ALICE").unwrap();

    let err = alice
        .execute(&Grant::grant(&table, Right::ALL, "ALICE").into(), &[])
        .unwrap_err();
    assert_eq!(ErrorKind::PermissionDenied, err.kind());
}

#[test]
fn grant_to_unknown_user() {
    let db = open();
    let mut sa = admin(&db);
    let table = create_identity_table(&mut sa, "T");

    let err = sa
        .execute(&Grant::grant(&table, Right::SELECT, "NOBODY").into(), &[])
        .unwrap_err();
    assert_eq!(ErrorKind::ObjectNotFound, err.kind());
}

#[test]
fn denied_alter_leaves_sequence_untouched() {
    let db = open();
    let mut sa = admin(&db);
    let table = create_identity_table(&mut sa, "T");
    db.create_user("ALICE", false).unwrap();
    let mut alice = db.new_session("ALICE").unwrap();

    let alter: Command = AlterSequence::for_column(&table, "ID")
        .unwrap()
        .with_increment(Expression::lit(5))
        .with_restart(Restart::With(Expression::lit(100)))
        .into();
    let version = db.catalog_version();

    // Alter through a column needs every right on the table.
    sa.execute(
        &Grant::grant(&table, Right::INSERT.union(Right::SELECT), "ALICE").into(),
        &[],
    )
    .unwrap();
    let err = alice.execute(&alter, &[]).unwrap_err();
    assert_eq!(ErrorKind::PermissionDenied, err.kind());

    let sequence = AlterSequence::for_column(&table, "ID").unwrap();
    assert_eq!(1, sequence.sequence().increment());
    assert_eq!(version + 1, db.catalog_version());

    sa.execute(&Grant::grant(&table, Right::ALL, "ALICE").into(), &[])
        .unwrap();
    alice.execute(&alter, &[]).unwrap();
    alice.execute(&insert_x(&table, &[1, 2]), &[]).unwrap();
    assert_eq!(
        vec![100, 105],
        alice.generated_keys().unwrap().collect_i64().unwrap()
    );
}
