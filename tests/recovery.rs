//! Failure Recovery Tests
//!
//! A failing write rolls back the open transaction. Transient failures
//! hand the lost rows to the recovery callback and the session goes on;
//! anything else closes the session.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{options, row, Failure, FlakyConnector, TestDb};
use table_versioning::compare::RowStatus;
use table_versioning::value::{Row, Value};
use table_versioning::versioning::{Versioning, VersioningError};

fn open_flaky(db: &TestDb, fail_on: usize, failure: Failure) -> (Versioning, Rc<std::cell::Cell<usize>>) {
    let connector = FlakyConnector::new(db.connector(), fail_on, failure);
    let connects = connector.connects();
    let session = Versioning::open(options(), Box::new(connector)).unwrap();
    (session, connects)
}

fn collect_rows(session: &mut Versioning, accept: bool) -> Rc<RefCell<Vec<Row>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    session
        .set_recovery_callback(move |_, rows| {
            sink.borrow_mut().extend_from_slice(rows);
            accept
        })
        .unwrap();
    seen
}

fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().filter_map(|r| r.value("id").as_i64()).collect()
}

/// Test: a busy database loses the open batch, not the session.
#[test]
fn test_transient_failure_hands_back_the_batch() {
    let db = TestDb::new();
    let (mut session, connects) = open_flaky(&db, 3, Failure::Busy);
    let lost = collect_rows(&mut session, true);

    session.process(row(1, "a")).unwrap().unwrap();
    session.process(row(2, "a")).unwrap().unwrap();
    assert!(session.process(row(3, "a")).unwrap().is_none());
    assert_eq!(ids(&lost.borrow()), vec![1, 2, 3]);

    let result = session.process(row(4, "a")).unwrap().unwrap();
    assert_eq!(result.status, RowStatus::New);
    session.finish().unwrap();

    assert_eq!(connects.get(), 1);
    assert_eq!(db.ids(), vec![4]);
}

/// Test: a dropped connection is replaced before the next row.
#[test]
fn test_lost_connection_reconnects() {
    let db = TestDb::new();
    let (mut session, connects) = open_flaky(&db, 2, Failure::Disconnect);
    let lost = collect_rows(&mut session, true);

    session.process(row(1, "a")).unwrap().unwrap();
    assert!(session.process(row(2, "a")).unwrap().is_none());
    assert_eq!(ids(&lost.borrow()), vec![1, 2]);
    assert_eq!(connects.get(), 2);

    session.process(row(1, "a")).unwrap().unwrap();
    session.finish().unwrap();
    assert_eq!(db.ids(), vec![1]);
}

/// Test: rejecting the lost rows ends the session.
#[test]
fn test_declined_recovery_closes_session() {
    let db = TestDb::new();
    let (mut session, _) = open_flaky(&db, 1, Failure::Busy);
    let lost = collect_rows(&mut session, false);

    let err = session.process(row(1, "a")).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(lost.borrow().len(), 1);
    assert!(!session.is_open());
    assert!(matches!(
        session.process(row(2, "a")),
        Err(VersioningError::SessionClosed)
    ));
}

/// Test: without a callback every write failure is fatal.
#[test]
fn test_no_callback_means_no_recovery() {
    let db = TestDb::new();
    let (mut session, _) = open_flaky(&db, 1, Failure::Busy);

    assert!(matches!(
        session.process(row(1, "a")),
        Err(VersioningError::Storage(_))
    ));
    assert!(!session.is_open());
}

/// Test: non-transient failures are not recovered even when accepted.
#[test]
fn test_statement_failure_is_not_recoverable() {
    let db = TestDb::new();
    let (mut session, _) = open_flaky(&db, 1, Failure::Statement);
    let lost = collect_rows(&mut session, true);

    let err = session.process(row(1, "a")).unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(lost.borrow().len(), 1);
    assert!(!session.is_open());
    assert_eq!(db.count(), 0);
}

/// Test: a type mismatch against the stored row closes the session.
#[test]
fn test_type_mismatch_closes_session() {
    let db = TestDb::new();
    let mut session = db.open(options());

    session.process(row(1, "a")).unwrap().unwrap();
    let err = session
        .process(Row::new().with("id", 1i64).with("name", Value::Int64(5)))
        .unwrap_err();
    assert!(matches!(err, VersioningError::FieldTypeMismatch { .. }));
    assert!(!session.is_open());
}
