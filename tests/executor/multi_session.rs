//! Multi-Session Tests
//!
//! Many sessions sharing one worker pool: independence, pool sizing and
//! worker reuse.

use std::sync::Arc;
use std::thread;

use crate::common::*;
use docsession::{CursorId, Error, ExecutorConfig, Projection, QueryCriteria, Session, WriteFailMode};

#[test]
fn sessions_on_separate_threads_all_commit() {
    let server = Arc::new(create_server());

    let threads: Vec<_> = (0..8u64)
        .map(|t| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                let executor = server
                    .factory
                    .open_session(Session::with_label(format!("client-{}", t)))
                    .unwrap();
                let txn = executor.create_transaction();
                for batch in 0..5 {
                    let _ = txn.insert_split_documents(
                        "events",
                        tagged_docs(t * 1000 + batch * 10, 10, "e"),
                        WriteFailMode::Ordered,
                    );
                }
                txn.commit().wait().unwrap();
                txn.close().wait().unwrap();
                executor.close().wait().unwrap();
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(server.backend.documents("events").len(), 8 * 50);
    assert_eq!(server.backend.outstanding(), 0);
    assert_eq!(server.factory.stats().leased, 0);
}

#[test]
fn paused_session_does_not_stall_others() {
    let server = create_server();
    let slow = server.factory.open_session(Session::new()).unwrap();
    let fast = server.factory.open_session(Session::new()).unwrap();

    let pause = slow.pause_until(5);
    let mut behind_pause = slow.get_databases();
    for i in 0..20 {
        fast.query("c", CursorId::new(i), QueryCriteria::all(), Projection::all(), 0)
            .wait()
            .unwrap();
    }
    assert!(behind_pause.try_result().is_none());

    server.ticks.advance_to(5);
    pause.wait().unwrap();
    assert!(behind_pause.wait().is_ok());
}

#[test]
fn pool_bounds_open_sessions_and_reuses_workers() {
    let mut config = ExecutorConfig::default();
    config.pool.max_workers = 2;
    let server = create_server_with(config);

    let a = server.factory.open_session(Session::new()).unwrap();
    let b = server.factory.open_session(Session::new()).unwrap();
    assert!(matches!(
        server.factory.open_session(Session::new()),
        Err(Error::TaskExecution { .. })
    ));

    a.close().wait().unwrap();
    let c = server.factory.open_session(Session::new()).unwrap();
    assert!(c.get_databases().wait().is_ok());
    assert!(b.get_databases().wait().is_ok());
    assert_eq!(server.factory.stats().worker_count, 2);
}
