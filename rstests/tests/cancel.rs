mod setup;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ridgedb_core::catalog::database::Database;
use ridgedb_core::config::database::DatabaseConfig;
use ridgedb_core::expr::Expression;
use ridgedb_core::expr::evaluator::{DefaultEvaluator, EvalContext, ExpressionEvaluator};
use ridgedb_core::scalar::ScalarValue;
use ridgedb_error::{ErrorKind, Result};

use crate::setup::{create_identity_table, insert_x};

/// Sleeps before evaluating every literal.
#[derive(Debug)]
struct SlowEvaluator {
    delay: Duration,
}

impl ExpressionEvaluator for SlowEvaluator {
    fn evaluate(&self, expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<ScalarValue> {
        if matches!(expr, Expression::Literal(_)) {
            thread::sleep(self.delay);
        }
        DefaultEvaluator.evaluate(expr, ctx)
    }
}

fn slow_database(delay_ms: u64) -> Arc<Database> {
    logutil::init_test();
    Database::with_evaluator(
        DatabaseConfig::default(),
        Arc::new(SlowEvaluator {
            delay: Duration::from_millis(delay_ms),
        }),
    )
    .unwrap()
}

#[test]
fn session_timeout_cancels_and_undoes_statement() {
    let db = slow_database(40);
    let mut session = db.new_session("SA").unwrap();
    let table = create_identity_table(&mut session, "T");

    session.set_setting("query_timeout_ms", 60_i64).unwrap();
    let err = session
        .execute(&insert_x(&table, &[1, 2, 3, 4, 5, 6]), &[])
        .unwrap_err();
    assert_eq!(ErrorKind::StatementCanceled, err.kind());
    assert_eq!(0, table.storage().row_count());

    session.reset_setting("query_timeout_ms").unwrap();
    session.execute(&insert_x(&table, &[1]), &[]).unwrap();
    assert_eq!(1, table.storage().row_count());
}

#[test]
fn statement_timeout_overrides_session() {
    let db = slow_database(400);
    let mut session = db.new_session("SA").unwrap();
    let table = create_identity_table(&mut session, "T");

    let mut stmt = session.create_statement().unwrap();
    stmt.set_query_timeout(1).unwrap();
    let err = stmt
        .execute_update(&insert_x(&table, &[1, 2, 3, 4]), &[])
        .unwrap_err();
    assert_eq!(ErrorKind::StatementCanceled, err.kind());
    assert_eq!(0, table.storage().row_count());
}

#[test]
fn cancel_from_another_thread() {
    let db = slow_database(30);
    let mut session = db.new_session("SA").unwrap();
    let table = create_identity_table(&mut session, "T");
    session.set_auto_commit(false).unwrap();
    session.execute(&insert_x(&table, &[0]), &[]).unwrap();

    let handle = session.cancel_handle();
    let canceler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.cancel();
    });

    let values: Vec<i32> = (1..=50).collect();
    let err = session.execute(&insert_x(&table, &values), &[]).unwrap_err();
    canceler.join().unwrap();
    assert_eq!(ErrorKind::StatementCanceled, err.kind());

    // Only the canceled statement is undone.
    assert!(session.in_transaction());
    assert_eq!(1, table.storage().row_count());

    // The flag resets for the next statement.
    session.execute(&insert_x(&table, &[2]), &[]).unwrap();
    session.commit().unwrap();
    assert_eq!(2, table.storage().row_count());
}
