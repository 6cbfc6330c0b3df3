//! Storage collaborator traits
//!
//! The executor never talks to a storage engine directly. It consumes these
//! traits, which a backend (SQL translation layer, in-memory store, ...)
//! implements:
//! - [`DbWrapper`]: hands out connections
//! - [`DbConnection`]: the storage primitives jobs call into
//! - [`DocumentCursor`]: a server-side iterator over a query result

use crate::error::Result;
use crate::index::{IndexedAttributes, NamedIndex};
use crate::types::{
    Database, DeleteOperation, DeleteResponse, InsertResponse, Projection, QueryCriteria,
    SplitDocument, WriteFailMode,
};

/// Source of storage connections.
///
/// Thread safety: connections are requested from whichever worker thread
/// first needs one, so implementations must be `Send + Sync`.
pub trait DbWrapper: Send + Sync {
    /// Check out a connection for one session scope or one transaction.
    ///
    /// # Errors
    ///
    /// Returns `ImplementationFailure` if no connection can be obtained.
    fn consume_session_connection(&self) -> Result<Box<dyn DbConnection>>;
}

/// One storage connection.
///
/// A connection is owned by exactly one session scope or transaction and is
/// only ever used from that session's worker, one call at a time.
pub trait DbConnection: Send {
    /// Evaluate `filter` and `projection` over `collection`.
    ///
    /// `max_results` of 0 means unbounded.
    fn query(
        &mut self,
        collection: &str,
        filter: &QueryCriteria,
        projection: &Projection,
        max_results: usize,
    ) -> Result<Box<dyn DocumentCursor>>;

    /// List databases visible under `database_name`
    fn get_databases(&mut self, database_name: &str) -> Result<Vec<Database>>;

    /// Insert a batch of documents
    fn insert_split_documents(
        &mut self,
        collection: &str,
        documents: Vec<SplitDocument>,
        mode: WriteFailMode,
    ) -> Result<InsertResponse>;

    /// Run a batch of deletes
    fn delete(
        &mut self,
        collection: &str,
        deletes: Vec<DeleteOperation>,
        mode: WriteFailMode,
    ) -> Result<DeleteResponse>;

    /// Create an index
    fn create_index(
        &mut self,
        collection: &str,
        index_name: &str,
        attributes: &IndexedAttributes,
        unique: bool,
        blocking: bool,
    ) -> Result<NamedIndex>;

    /// Drop an index. Returns false if it did not exist.
    fn drop_index(&mut self, collection: &str, index_name: &str) -> Result<bool>;

    /// List the indexes of a collection
    fn get_indexes(&mut self, collection: &str) -> Result<Vec<NamedIndex>>;

    /// Make pending writes durable
    fn commit(&mut self) -> Result<()>;

    /// Discard pending writes
    fn rollback(&mut self) -> Result<()>;

    /// Give the connection back to its provider
    fn close(&mut self) -> Result<()>;
}

/// Server-side iterator over a result set.
pub trait DocumentCursor: Send {
    /// Return up to `limit` documents, fewer once exhausted.
    fn read(&mut self, limit: usize) -> Result<Vec<SplitDocument>>;

    /// Number of documents not yet read. Must not consume anything.
    fn count_remaining(&mut self) -> Result<usize>;

    /// Release the cursor's resources
    fn close(&mut self) -> Result<()>;
}

/// Cursor over a result set that is already in memory.
///
/// Backends that materialize query results can hand this out directly.
#[derive(Debug, Default)]
pub struct MaterializedCursor {
    documents: std::collections::VecDeque<SplitDocument>,
}

impl MaterializedCursor {
    /// Wrap a result set
    pub fn new(documents: Vec<SplitDocument>) -> Self {
        Self {
            documents: documents.into(),
        }
    }
}

impl DocumentCursor for MaterializedCursor {
    fn read(&mut self, limit: usize) -> Result<Vec<SplitDocument>> {
        let take = limit.min(self.documents.len());
        Ok(self.documents.drain(..take).collect())
    }

    fn count_remaining(&mut self) -> Result<usize> {
        Ok(self.documents.len())
    }

    fn close(&mut self) -> Result<()> {
        self.documents.clear();
        Ok(())
    }
}
