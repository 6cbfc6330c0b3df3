//! The session executor - one session's entry point.
//!
//! A [`SessionExecutor`] binds one leased worker to one session for its whole
//! lifetime. Every operation on it, and on the transactions it creates,
//! becomes a job on that worker, so a session's operations run one at a time
//! in exactly the order they were submitted.

use std::sync::{Arc, Weak};

use docsession_core::{
    CursorId, Database, DbWrapper, Projection, QueryCriteria, Session, SplitDocument,
};
use parking_lot::Mutex;

use crate::cursor::CursorRegistry;
use crate::dispatch::SessionDispatcher;
use crate::handle::JobHandle;
use crate::job::Job;
use crate::jobs::cursor::{
    CloseCursorJob, CountRemainingDocsJob, QueryJob, ReadAllCursorJob, ReadCursorJob,
};
use crate::jobs::database::{GetDatabasesJob, PauseJob, ReleaseSessionJob};
use crate::lazy::LazyConnection;
use crate::tick::TickMonitor;
use crate::transaction::SessionTransaction;

/// Sequential executor for one session.
///
/// Created by [`ExecutorFactory::open_session`](crate::ExecutorFactory::open_session).
///
/// # Thread Safety
///
/// `SessionExecutor` is `Send + Sync`: any number of threads may submit
/// operations. Operations submitted from different threads are ordered by
/// the moment each submission call takes the session's queue.
///
/// # Example
///
/// ```ignore
/// use docsession::{CursorId, Projection, QueryCriteria, Session};
///
/// let executor = factory.open_session(Session::new())?;
/// executor
///     .query("users", CursorId::new(1), QueryCriteria::all(), Projection::all(), 0)
///     .wait()?;
/// let page = executor.read_cursor(CursorId::new(1), 50).wait()?;
/// executor.close_cursor(CursorId::new(1)).wait()?;
/// executor.close().wait()?;
/// ```
pub struct SessionExecutor {
    dispatcher: Arc<SessionDispatcher>,
    wrapper: Arc<dyn DbWrapper>,
    /// Session-scope connection used by queries and database listing
    connection: Arc<LazyConnection>,
    cursors: Arc<CursorRegistry>,
    monitor: Arc<dyn TickMonitor>,
    database_name: String,
    read_all_batch_size: usize,
    /// Connections of transactions created here, released on close
    transactions: Mutex<Vec<Weak<LazyConnection>>>,
}

impl SessionExecutor {
    pub(crate) fn new(
        dispatcher: SessionDispatcher,
        wrapper: Arc<dyn DbWrapper>,
        monitor: Arc<dyn TickMonitor>,
        database_name: String,
        read_all_batch_size: usize,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            connection: Arc::new(LazyConnection::new(Arc::clone(&wrapper))),
            wrapper,
            cursors: Arc::new(CursorRegistry::new()),
            monitor,
            database_name,
            read_all_batch_size,
            transactions: Mutex::new(Vec::new()),
        }
    }

    /// The session this executor serves
    pub fn session(&self) -> &Session {
        self.dispatcher.session()
    }

    /// Index of the leased worker in the pool, `None` once closed
    pub fn worker_index(&self) -> Option<usize> {
        self.dispatcher.worker_index()
    }

    pub(crate) fn submit<J: Job>(&self, job: J) -> JobHandle<J::Output> {
        self.dispatcher.submit(job)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Open a transaction with its own connection.
    ///
    /// Nothing is acquired yet: the connection is checked out by the
    /// transaction's first job that needs it, and an acquisition failure
    /// surfaces there as `ImplementationFailure`.
    pub fn create_transaction(&self) -> SessionTransaction {
        let connection = Arc::new(LazyConnection::new(Arc::clone(&self.wrapper)));
        {
            let mut transactions = self.transactions.lock();
            transactions.retain(|t| t.strong_count() > 0);
            transactions.push(Arc::downgrade(&connection));
        }
        SessionTransaction::new(Arc::clone(&self.dispatcher), connection)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Block this session's worker until the shared tick reaches `tick`.
    ///
    /// Jobs submitted afterwards wait behind the pause. An interrupted wait
    /// fails this job with `InterruptedWait`; the worker carries on.
    pub fn pause_until(&self, tick: u64) -> JobHandle<()> {
        self.submit(PauseJob {
            monitor: Arc::clone(&self.monitor),
            tick,
        })
    }

    // =========================================================================
    // Cursors
    // =========================================================================

    /// Evaluate `filter` and `projection` over `collection` and open a cursor
    /// `cursor_id` over at most `max_results` documents (0 for no bound).
    ///
    /// Resolves once the cursor is registered; fetch rows with
    /// [`read_cursor`](Self::read_cursor).
    pub fn query(
        &self,
        collection: impl Into<String>,
        cursor_id: CursorId,
        filter: QueryCriteria,
        projection: Projection,
        max_results: usize,
    ) -> JobHandle<()> {
        self.submit(QueryJob {
            connection: Arc::clone(&self.connection),
            cursors: Arc::clone(&self.cursors),
            collection: collection.into(),
            cursor_id,
            filter,
            projection,
            max_results,
        })
    }

    /// Read up to `limit` documents from a cursor, fewer once it is
    /// exhausted.
    pub fn read_cursor(&self, cursor_id: CursorId, limit: usize) -> JobHandle<Vec<SplitDocument>> {
        self.submit(ReadCursorJob {
            cursors: Arc::clone(&self.cursors),
            cursor_id,
            limit,
        })
    }

    /// Read everything left in a cursor.
    ///
    /// The whole remainder is materialized; use [`read_cursor`](Self::read_cursor)
    /// to bound memory on large result sets.
    pub fn read_all_cursor(&self, cursor_id: CursorId) -> JobHandle<Vec<SplitDocument>> {
        self.submit(ReadAllCursorJob {
            cursors: Arc::clone(&self.cursors),
            cursor_id,
            batch_size: self.read_all_batch_size,
        })
    }

    /// Number of documents left in a cursor. Consumes nothing.
    pub fn count_remaining_docs(&self, cursor_id: CursorId) -> JobHandle<usize> {
        self.submit(CountRemainingDocsJob {
            cursors: Arc::clone(&self.cursors),
            cursor_id,
        })
    }

    /// Close a cursor. Later operations on `cursor_id` fail with
    /// `UnknownCursor`.
    pub fn close_cursor(&self, cursor_id: CursorId) -> JobHandle<()> {
        self.submit(CloseCursorJob {
            cursors: Arc::clone(&self.cursors),
            cursor_id,
        })
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// List the databases visible in this session's scope.
    pub fn get_databases(&self) -> JobHandle<Vec<Database>> {
        self.submit(GetDatabasesJob {
            connection: Arc::clone(&self.connection),
            database_name: self.database_name.clone(),
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Stop accepting work and give the worker back to the pool.
    ///
    /// Jobs already queued still run. After them a final job drops the
    /// session's open cursors and releases its connections. Later
    /// submissions resolve to `TaskExecution`. Closing twice is a no-op.
    pub fn close(&self) -> JobHandle<()> {
        let transactions: Vec<Arc<LazyConnection>> = self
            .transactions
            .lock()
            .drain(..)
            .filter_map(|t| t.upgrade())
            .collect();
        let job = ReleaseSessionJob {
            connection: Arc::clone(&self.connection),
            cursors: Arc::clone(&self.cursors),
            transactions,
        };
        self.dispatcher
            .close_with(job)
            .unwrap_or_else(|| JobHandle::ready(Ok(())))
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    /// Number of cursors currently open on this session
    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }
}

impl std::fmt::Debug for SessionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionExecutor")
            .field("session", self.session())
            .field("closed", &self.is_closed())
            .field("connection", &self.connection)
            .field("cursors", &self.cursors)
            .finish()
    }
}

impl Drop for SessionExecutor {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.close();
        }
    }
}
