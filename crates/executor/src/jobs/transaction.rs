//! Transaction control actions.
//!
//! None of these acquire a connection the transaction never used: with no
//! connection there is nothing to commit, roll back or release.

use docsession_core::Result;

use crate::job::TransactionalAction;
use crate::lazy::LazyConnection;
use crate::report::OperationKind;

/// Make the transaction's pending writes durable.
pub(crate) struct CommitAction;

impl TransactionalAction for CommitAction {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::Commit
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<()> {
        if !connection.is_acquired() {
            return Ok(());
        }
        connection.with(|conn| conn.commit())
    }
}

/// Discard the transaction's pending writes. Allowed after an abort.
pub(crate) struct RollbackAction;

impl TransactionalAction for RollbackAction {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::Rollback
    }

    fn runs_when_aborted(&self) -> bool {
        true
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<()> {
        if !connection.is_acquired() {
            return Ok(());
        }
        connection.with(|conn| conn.rollback())
    }
}

/// Give the transaction's connection back to its provider.
pub(crate) struct CloseConnectionAction;

impl TransactionalAction for CloseConnectionAction {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::CloseConnection
    }

    fn runs_when_aborted(&self) -> bool {
        true
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<()> {
        connection.release()
    }
}
