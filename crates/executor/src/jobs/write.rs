//! Batch write actions.
//!
//! Per-item failures come back inside the response. Under
//! [`WriteFailMode::Transactional`] any failed item also poisons the
//! transaction; the other modes leave it usable.

use docsession_core::{
    DeleteOperation, DeleteResponse, InsertResponse, Result, SplitDocument, WriteFailMode,
};

use crate::job::TransactionalAction;
use crate::lazy::LazyConnection;
use crate::report::OperationKind;

/// Insert a batch of documents.
pub(crate) struct InsertAction {
    pub(crate) collection: String,
    pub(crate) documents: Vec<SplitDocument>,
    pub(crate) mode: WriteFailMode,
}

impl TransactionalAction for InsertAction {
    type Output = InsertResponse;

    fn kind(&self) -> OperationKind {
        OperationKind::Insert
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<InsertResponse> {
        let documents = std::mem::take(&mut self.documents);
        connection.with(|conn| conn.insert_split_documents(&self.collection, documents, self.mode))
    }

    fn poisons(&self, output: &InsertResponse) -> bool {
        self.mode.aborts_transaction() && !output.success
    }
}

/// Run a batch of deletes.
pub(crate) struct DeleteAction {
    pub(crate) collection: String,
    pub(crate) deletes: Vec<DeleteOperation>,
    pub(crate) mode: WriteFailMode,
}

impl TransactionalAction for DeleteAction {
    type Output = DeleteResponse;

    fn kind(&self) -> OperationKind {
        OperationKind::Delete
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<DeleteResponse> {
        let deletes = std::mem::take(&mut self.deletes);
        connection.with(|conn| conn.delete(&self.collection, deletes, self.mode))
    }

    fn poisons(&self, output: &DeleteResponse) -> bool {
        self.mode.aborts_transaction() && !output.success
    }
}
