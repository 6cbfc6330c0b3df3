//! The job protocol.
//!
//! A [`Job`] is a self-contained unit of work: it carries its own inputs and
//! produces a result or a failure. It never schedules itself; the session
//! dispatcher decides when it runs.
//!
//! A [`TransactionalJob`] wraps a [`TransactionalAction`] with the abort
//! protocol every transactional operation follows:
//! 1. consult the transaction's abort flag before touching the connection,
//!    short-circuiting with `TransactionAborted` unless the action is allowed
//!    to run after an abort (rollback, connection release)
//! 2. run the action
//! 3. abort the transaction if the action failed (or panicked), so no later
//!    transactional work touches a possibly corrupted connection

use std::sync::Arc;

use docsession_core::{Error, Result};
use tracing::debug;

use crate::lazy::LazyConnection;
use crate::report::OperationKind;

/// A unit of work submitted to a session's worker.
pub trait Job: Send + 'static {
    /// Result type
    type Output: Send + 'static;

    /// Which operation this job implements
    fn kind(&self) -> OperationKind;

    /// Run the job on the worker thread
    fn execute(self) -> Result<Self::Output>;

    /// Value the exception handler may substitute for a failure.
    fn fallback(&self) -> Option<Self::Output> {
        None
    }
}

/// What the dispatcher knows about a job while it handles its failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    /// The operation
    pub kind: OperationKind,
    /// Submission sequence number within the session
    pub sequence: u64,
}

/// Shared abort state of one transaction.
pub trait TransactionAborter: Send + Sync {
    /// Whether an earlier failure poisoned the transaction
    fn is_aborted(&self) -> bool;

    /// Poison the transaction. Idempotent.
    fn abort(&self, kind: OperationKind);
}

/// The body of a transactional operation.
pub trait TransactionalAction: Send + 'static {
    /// Result type
    type Output: Send + 'static;

    /// Which operation this action implements
    fn kind(&self) -> OperationKind;

    /// Whether the action still runs once the transaction is aborted
    fn runs_when_aborted(&self) -> bool {
        false
    }

    /// Perform the action against the transaction's connection
    fn run(&mut self, connection: &LazyConnection) -> Result<Self::Output>;

    /// Whether a successful result still poisons the transaction, e.g. a
    /// whole-batch write that reported failed items.
    fn poisons(&self, _output: &Self::Output) -> bool {
        false
    }

    /// Value the exception handler may substitute for a failure.
    fn fallback(&self) -> Option<Self::Output> {
        None
    }
}

/// A [`TransactionalAction`] bound to its transaction's connection and abort
/// state.
pub struct TransactionalJob<A> {
    action: A,
    connection: Arc<LazyConnection>,
    aborter: Arc<dyn TransactionAborter>,
}

impl<A: TransactionalAction> TransactionalJob<A> {
    /// Bind `action` to a transaction
    pub fn new(
        action: A,
        connection: Arc<LazyConnection>,
        aborter: Arc<dyn TransactionAborter>,
    ) -> Self {
        Self {
            action,
            connection,
            aborter,
        }
    }
}

/// Aborts the transaction if the action unwinds.
struct AbortOnUnwind<'a> {
    aborter: &'a dyn TransactionAborter,
    kind: OperationKind,
}

impl Drop for AbortOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.aborter.abort(self.kind);
        }
    }
}

impl<A: TransactionalAction> Job for TransactionalJob<A> {
    type Output = A::Output;

    fn kind(&self) -> OperationKind {
        self.action.kind()
    }

    fn fallback(&self) -> Option<Self::Output> {
        self.action.fallback()
    }

    fn execute(mut self) -> Result<Self::Output> {
        let kind = self.action.kind();
        if self.aborter.is_aborted() && !self.action.runs_when_aborted() {
            debug!(target: "docsession::txn", op = kind.name(), "skipped on aborted transaction");
            return Err(Error::TransactionAborted);
        }

        let _guard = AbortOnUnwind {
            aborter: self.aborter.as_ref(),
            kind,
        };
        match self.action.run(&self.connection) {
            Ok(output) => {
                if self.action.poisons(&output) {
                    self.aborter.abort(kind);
                }
                Ok(output)
            }
            Err(e) => {
                self.aborter.abort(kind);
                Err(e)
            }
        }
    }
}
