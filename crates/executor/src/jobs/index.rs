//! Index management actions.

use docsession_core::{IndexedAttributes, NamedIndex, Result};

use crate::job::TransactionalAction;
use crate::lazy::LazyConnection;
use crate::report::OperationKind;

/// Create an index over `attributes`.
pub(crate) struct CreateIndexAction {
    pub(crate) collection: String,
    pub(crate) index_name: String,
    pub(crate) attributes: IndexedAttributes,
    pub(crate) unique: bool,
    pub(crate) blocking: bool,
}

impl TransactionalAction for CreateIndexAction {
    type Output = NamedIndex;

    fn kind(&self) -> OperationKind {
        OperationKind::CreateIndex
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<NamedIndex> {
        connection.with(|conn| {
            conn.create_index(
                &self.collection,
                &self.index_name,
                &self.attributes,
                self.unique,
                self.blocking,
            )
        })
    }
}

/// Drop an index. Resolves to false if it did not exist.
pub(crate) struct DropIndexAction {
    pub(crate) collection: String,
    pub(crate) index_name: String,
}

impl TransactionalAction for DropIndexAction {
    type Output = bool;

    fn kind(&self) -> OperationKind {
        OperationKind::DropIndex
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<bool> {
        connection.with(|conn| conn.drop_index(&self.collection, &self.index_name))
    }
}

/// List a collection's indexes.
pub(crate) struct GetIndexesAction {
    pub(crate) collection: String,
}

impl TransactionalAction for GetIndexesAction {
    type Output = Vec<NamedIndex>;

    fn kind(&self) -> OperationKind {
        OperationKind::GetIndexes
    }

    fn run(&mut self, connection: &LazyConnection) -> Result<Vec<NamedIndex>> {
        connection.with(|conn| conn.get_indexes(&self.collection))
    }

    fn fallback(&self) -> Option<Vec<NamedIndex>> {
        Some(Vec::new())
    }
}
