//! Cursor jobs.
//!
//! A query opens a storage cursor on the session connection and parks it in
//! the session's [`CursorRegistry`]; every other job here works on the
//! registry alone.

use std::sync::Arc;

use docsession_core::{CursorId, Error, Projection, QueryCriteria, Result, SplitDocument};

use crate::cursor::CursorRegistry;
use crate::job::Job;
use crate::lazy::LazyConnection;
use crate::report::OperationKind;

// =============================================================================
// Query
// =============================================================================

/// Evaluate a query and register its cursor.
pub(crate) struct QueryJob {
    pub(crate) connection: Arc<LazyConnection>,
    pub(crate) cursors: Arc<CursorRegistry>,
    pub(crate) collection: String,
    pub(crate) cursor_id: CursorId,
    pub(crate) filter: QueryCriteria,
    pub(crate) projection: Projection,
    pub(crate) max_results: usize,
}

impl Job for QueryJob {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::Query
    }

    fn execute(self) -> Result<()> {
        // Checked up front so a duplicate id never reaches storage
        if self.cursors.contains(self.cursor_id) {
            return Err(Error::illegal_argument(format!(
                "cursor {} is already open",
                self.cursor_id
            )));
        }
        let cursor = self.connection.with(|conn| {
            conn.query(
                &self.collection,
                &self.filter,
                &self.projection,
                self.max_results,
            )
        })?;
        self.cursors
            .register(self.cursor_id, cursor, self.max_results)
    }
}

// =============================================================================
// Reads
// =============================================================================

/// Read one batch from a cursor.
pub(crate) struct ReadCursorJob {
    pub(crate) cursors: Arc<CursorRegistry>,
    pub(crate) cursor_id: CursorId,
    pub(crate) limit: usize,
}

impl Job for ReadCursorJob {
    type Output = Vec<SplitDocument>;

    fn kind(&self) -> OperationKind {
        OperationKind::ReadCursor
    }

    fn execute(self) -> Result<Vec<SplitDocument>> {
        self.cursors.read(self.cursor_id, self.limit)
    }

    fn fallback(&self) -> Option<Vec<SplitDocument>> {
        Some(Vec::new())
    }
}

/// Drain a cursor.
pub(crate) struct ReadAllCursorJob {
    pub(crate) cursors: Arc<CursorRegistry>,
    pub(crate) cursor_id: CursorId,
    pub(crate) batch_size: usize,
}

impl Job for ReadAllCursorJob {
    type Output = Vec<SplitDocument>;

    fn kind(&self) -> OperationKind {
        OperationKind::ReadAllCursor
    }

    fn execute(self) -> Result<Vec<SplitDocument>> {
        self.cursors.read_all(self.cursor_id, self.batch_size)
    }

    fn fallback(&self) -> Option<Vec<SplitDocument>> {
        Some(Vec::new())
    }
}

/// Count what is left in a cursor.
pub(crate) struct CountRemainingDocsJob {
    pub(crate) cursors: Arc<CursorRegistry>,
    pub(crate) cursor_id: CursorId,
}

impl Job for CountRemainingDocsJob {
    type Output = usize;

    fn kind(&self) -> OperationKind {
        OperationKind::CountRemainingDocs
    }

    fn execute(self) -> Result<usize> {
        self.cursors.count_remaining(self.cursor_id)
    }

    fn fallback(&self) -> Option<usize> {
        Some(0)
    }
}

// =============================================================================
// Close
// =============================================================================

/// Close a cursor.
pub(crate) struct CloseCursorJob {
    pub(crate) cursors: Arc<CursorRegistry>,
    pub(crate) cursor_id: CursorId,
}

impl Job for CloseCursorJob {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::CloseCursor
    }

    fn execute(self) -> Result<()> {
        self.cursors.close(self.cursor_id)
    }

    // The id is forgotten even when the storage close fails
    fn fallback(&self) -> Option<()> {
        Some(())
    }
}
