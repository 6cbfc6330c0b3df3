//! Session Workflow Tests
//!
//! A client session doing what clients do: write in a transaction, commit,
//! page through a query, manage indexes, and clean up.

use crate::common::*;
use docsession::{
    AttributeReference, CursorId, DeleteOperation, Error, IndexedAttributes, Projection,
    QueryCriteria, Session, WriteFailMode,
};

// ============================================================================
// Write then read
// ============================================================================

#[test]
fn committed_writes_are_queryable_on_same_session() {
    let server = create_server();
    let executor = server
        .factory
        .open_session(Session::with_label("writer"))
        .unwrap();

    let txn = executor.create_transaction();
    let _ = txn.insert_split_documents("orders", tagged_docs(0, 25, "open"), WriteFailMode::Ordered);
    let _ = txn.insert_split_documents("orders", tagged_docs(25, 5, "closed"), WriteFailMode::Ordered);
    let commit = txn.commit();
    let query = executor.query(
        "orders",
        CursorId::new(1),
        QueryCriteria::new(serde_json::json!({ "tag": "open" })),
        Projection::all(),
        0,
    );
    commit.wait().unwrap();
    query.wait().unwrap();

    let mut pages = Vec::new();
    loop {
        let page = executor.read_cursor(CursorId::new(1), 10).wait().unwrap();
        if page.is_empty() {
            break;
        }
        pages.push(page.len());
    }
    assert_eq!(pages, vec![10, 10, 5]);

    executor.close_cursor(CursorId::new(1)).wait().unwrap();
    txn.close().wait().unwrap();
    executor.close().wait().unwrap();
    assert_eq!(server.backend.outstanding(), 0);
}

#[test]
fn bounded_query_and_count() {
    let server = create_server();
    let executor = server.factory.open_session(Session::new()).unwrap();

    let txn = executor.create_transaction();
    let _ = txn.insert_split_documents("items", tagged_docs(0, 40, "x"), WriteFailMode::Ordered);
    txn.commit().wait().unwrap();

    executor
        .query("items", CursorId::new(7), QueryCriteria::all(), Projection::all(), 12)
        .wait()
        .unwrap();
    assert_eq!(executor.count_remaining_docs(CursorId::new(7)).wait(), Ok(12));
    assert_eq!(executor.read_all_cursor(CursorId::new(7)).wait().unwrap().len(), 12);
}

#[test]
fn deletes_and_indexes() {
    let server = create_server();
    let executor = server.factory.open_session(Session::new()).unwrap();
    let txn = executor.create_transaction();

    let _ = txn.insert_split_documents("users", tagged_docs(0, 4, "u"), WriteFailMode::Ordered);
    txn.commit().wait().unwrap();

    let response = txn
        .delete(
            "users",
            vec![DeleteOperation {
                query: QueryCriteria::new(serde_json::json!({ "n": 2 })),
                just_one: true,
            }],
            WriteFailMode::IsolatedDocument,
        )
        .wait()
        .unwrap();
    assert_eq!(response.deleted, 1);
    assert_eq!(server.backend.documents("users").len(), 3);

    let attributes = IndexedAttributes::builder()
        .add_attribute(AttributeReference::parse("tag").unwrap(), true)
        .add_attribute(AttributeReference::parse("n").unwrap(), false)
        .build()
        .unwrap();
    let index = txn
        .create_index("users", "tag_n", attributes.clone(), false, true)
        .wait()
        .unwrap();
    assert_eq!(index.attributes.to_string(), "tag (asc), n (desc)");
    assert_eq!(txn.get_indexes("users").wait().unwrap().len(), 1);
    assert_eq!(txn.drop_index("users", "tag_n").wait(), Ok(true));
}

// ============================================================================
// Failure recovery
// ============================================================================

#[test]
fn client_recovers_from_aborted_transaction() {
    let server = create_server();
    let executor = server.factory.open_session(Session::new()).unwrap();

    let txn = executor.create_transaction();
    let failed = txn
        .insert_split_documents("", tagged_docs(0, 1, "bad"), WriteFailMode::Ordered)
        .wait();
    assert!(matches!(failed, Err(Error::ImplementationFailure { .. })));
    assert!(txn.is_aborted());
    assert_eq!(txn.commit().wait(), Err(Error::TransactionAborted));

    // The documented recovery path: roll back, close, start over
    txn.rollback().wait().unwrap();
    txn.close().wait().unwrap();

    let retry = executor.create_transaction();
    retry
        .insert_split_documents("good", tagged_docs(0, 1, "ok"), WriteFailMode::Ordered)
        .wait()
        .unwrap();
    retry.commit().wait().unwrap();
    assert_eq!(server.backend.documents("good").len(), 1);
}

#[test]
fn get_databases_lists_configured_scope() {
    let server = create_server();
    let executor = server.factory.open_session(Session::new()).unwrap();
    let databases = executor.get_databases().wait().unwrap();
    assert_eq!(databases[0].name, "docsession");
}
