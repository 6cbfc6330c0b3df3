//! Session transactions.
//!
//! A [`SessionTransaction`] groups transactional jobs that share one lazily
//! acquired connection and one abort state. Its jobs go through the owning
//! session's worker, so they form an order-preserving subsequence of the
//! session's job stream and never touch the connection concurrently.
//!
//! Two flags are shared between calling threads and the worker:
//! - `aborted`: set by the first failing job, consulted by every later one
//! - `closed`: set synchronously by [`SessionTransaction::close`]
//!
//! Both only ever go from false to true.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docsession_core::{
    DeleteOperation, DeleteResponse, Error, IndexedAttributes, InsertResponse, NamedIndex,
    SplitDocument, WriteFailMode,
};
use tracing::debug;

use crate::dispatch::SessionDispatcher;
use crate::handle::JobHandle;
use crate::job::{TransactionAborter, TransactionalAction, TransactionalJob};
use crate::jobs::index::{CreateIndexAction, DropIndexAction, GetIndexesAction};
use crate::jobs::transaction::{CloseConnectionAction, CommitAction, RollbackAction};
use crate::jobs::write::{DeleteAction, InsertAction};
use crate::lazy::LazyConnection;
use crate::report::OperationKind;

/// Abort and close flags of one transaction.
#[derive(Debug, Default)]
pub(crate) struct TransactionState {
    aborted: AtomicBool,
    closed: AtomicBool,
}

impl TransactionState {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Set the closed flag. Returns true for the call that set it.
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

impl TransactionAborter for TransactionState {
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn abort(&self, kind: OperationKind) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            debug!(target: "docsession::txn", op = kind.name(), "transaction aborted");
        }
    }
}

/// A transaction on one session.
///
/// Obtained from [`SessionExecutor::create_transaction`](crate::SessionExecutor::create_transaction).
/// Every operation returns a [`JobHandle`] immediately; the work runs on the
/// session's worker. Dropping an open transaction closes it.
pub struct SessionTransaction {
    dispatcher: Arc<SessionDispatcher>,
    connection: Arc<LazyConnection>,
    state: Arc<TransactionState>,
}

impl SessionTransaction {
    pub(crate) fn new(dispatcher: Arc<SessionDispatcher>, connection: Arc<LazyConnection>) -> Self {
        Self {
            dispatcher,
            connection,
            state: Arc::new(TransactionState::default()),
        }
    }

    fn submit<A: TransactionalAction>(&self, action: A) -> JobHandle<A::Output> {
        if self.state.is_closed() {
            return self
                .dispatcher
                .reject(action.kind(), Error::TransactionClosed);
        }
        self.dispatcher.submit(self.bind(action))
    }

    fn bind<A: TransactionalAction>(&self, action: A) -> TransactionalJob<A> {
        let aborter: Arc<dyn TransactionAborter> = self.state.clone();
        TransactionalJob::new(action, Arc::clone(&self.connection), aborter)
    }

    // =========================================================================
    // Transaction control
    // =========================================================================

    /// Make pending writes durable.
    ///
    /// Resolves to `TransactionAborted` if an earlier job failed.
    pub fn commit(&self) -> JobHandle<()> {
        self.submit(CommitAction)
    }

    /// Discard pending writes.
    ///
    /// Permitted on an aborted transaction; this is how a caller cleans up
    /// after a failure.
    pub fn rollback(&self) -> JobHandle<()> {
        self.submit(RollbackAction)
    }

    /// Stop accepting work and release the connection.
    ///
    /// [`is_closed`](Self::is_closed) is true as soon as this returns; the
    /// release itself runs on the worker after every job already queued.
    /// The release is never refused for a full queue, and runs on the
    /// calling thread if the pool was shut down. Closing twice is a no-op.
    pub fn close(&self) -> JobHandle<()> {
        if !self.state.mark_closed() {
            return JobHandle::ready(Ok(()));
        }
        self.dispatcher.submit_cleanup(self.bind(CloseConnectionAction))
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Whether a failed job poisoned the transaction
    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert documents into `collection`.
    ///
    /// Per-item failures are reported in the response. Under
    /// [`WriteFailMode::Transactional`] any failed item also aborts the
    /// transaction.
    pub fn insert_split_documents(
        &self,
        collection: impl Into<String>,
        documents: Vec<SplitDocument>,
        mode: WriteFailMode,
    ) -> JobHandle<InsertResponse> {
        self.submit(InsertAction {
            collection: collection.into(),
            documents,
            mode,
        })
    }

    /// Run a batch of deletes against `collection`.
    pub fn delete(
        &self,
        collection: impl Into<String>,
        deletes: Vec<DeleteOperation>,
        mode: WriteFailMode,
    ) -> JobHandle<DeleteResponse> {
        self.submit(DeleteAction {
            collection: collection.into(),
            deletes,
            mode,
        })
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    /// Create an index named `index_name` over `attributes`.
    pub fn create_index(
        &self,
        collection: impl Into<String>,
        index_name: impl Into<String>,
        attributes: IndexedAttributes,
        unique: bool,
        blocking: bool,
    ) -> JobHandle<NamedIndex> {
        self.submit(CreateIndexAction {
            collection: collection.into(),
            index_name: index_name.into(),
            attributes,
            unique,
            blocking,
        })
    }

    /// Drop an index. Resolves to false if it did not exist.
    pub fn drop_index(
        &self,
        collection: impl Into<String>,
        index_name: impl Into<String>,
    ) -> JobHandle<bool> {
        self.submit(DropIndexAction {
            collection: collection.into(),
            index_name: index_name.into(),
        })
    }

    /// List the indexes of `collection`.
    pub fn get_indexes(&self, collection: impl Into<String>) -> JobHandle<Vec<NamedIndex>> {
        self.submit(GetIndexesAction {
            collection: collection.into(),
        })
    }
}

impl std::fmt::Debug for SessionTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransaction")
            .field("session", &self.dispatcher.session().id())
            .field("aborted", &self.is_aborted())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for SessionTransaction {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.close();
        }
    }
}
