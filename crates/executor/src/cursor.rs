//! Session-scoped cursor registry.
//!
//! A cursor outlives the `query` job that opened it: later jobs on the same
//! session address it by id. The registry is shared between the executor and
//! every job it queues.

use dashmap::DashMap;
use parking_lot::Mutex;

use docsession_core::{CursorId, DocumentCursor, Error, Result, SplitDocument};
use tracing::{debug, warn};

/// A registered storage cursor and its remaining result budget.
struct OpenCursor {
    /// Only accessed through `get_mut`; the mutex makes the entry `Sync`
    cursor: Mutex<Box<dyn DocumentCursor>>,
    /// `None` means unbounded
    remaining: Option<usize>,
}

impl OpenCursor {
    fn read(&mut self, limit: usize) -> Result<Vec<SplitDocument>> {
        let limit = match self.remaining {
            Some(remaining) => limit.min(remaining),
            None => limit,
        };
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut documents = self.cursor.get_mut().read(limit)?;
        if documents.len() > limit {
            warn!(
                target: "docsession::cursor",
                limit,
                returned = documents.len(),
                "storage cursor returned more documents than requested, dropping the excess"
            );
            documents.truncate(limit);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= documents.len();
        }
        Ok(documents)
    }
}

/// Open cursors of one session.
#[derive(Default)]
pub struct CursorRegistry {
    cursors: DashMap<CursorId, OpenCursor>,
}

impl CursorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cursor` under `id`, bounded to `max_results` documents
    /// (0 means unbounded).
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if `id` is already open. The new cursor is
    /// closed in that case.
    pub fn register(
        &self,
        id: CursorId,
        mut cursor: Box<dyn DocumentCursor>,
        max_results: usize,
    ) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.cursors.entry(id) {
            Entry::Occupied(_) => {
                if let Err(e) = cursor.close() {
                    warn!(target: "docsession::cursor", cursor = %id, error = %e, "closing duplicate cursor failed");
                }
                Err(Error::illegal_argument(format!(
                    "cursor {} is already open",
                    id
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(OpenCursor {
                    cursor: Mutex::new(cursor),
                    remaining: (max_results > 0).then_some(max_results),
                });
                debug!(target: "docsession::cursor", cursor = %id, max_results, "cursor opened");
                Ok(())
            }
        }
    }

    /// Read up to `limit` documents in iteration order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCursor` if `id` is not open.
    pub fn read(&self, id: CursorId, limit: usize) -> Result<Vec<SplitDocument>> {
        let mut entry = self
            .cursors
            .get_mut(&id)
            .ok_or(Error::UnknownCursor { cursor: id })?;
        entry.read(limit)
    }

    /// Read everything left, `batch_size` documents per storage read.
    ///
    /// The result equals the concatenation of repeated [`read`](Self::read)
    /// calls until one returns nothing.
    pub fn read_all(&self, id: CursorId, batch_size: usize) -> Result<Vec<SplitDocument>> {
        let batch_size = batch_size.max(1);
        let mut entry = self
            .cursors
            .get_mut(&id)
            .ok_or(Error::UnknownCursor { cursor: id })?;
        let mut documents = Vec::new();
        loop {
            let batch = entry.read(batch_size)?;
            if batch.is_empty() {
                break;
            }
            documents.extend(batch);
        }
        Ok(documents)
    }

    /// Documents left to read, without consuming any.
    pub fn count_remaining(&self, id: CursorId) -> Result<usize> {
        let mut entry = self
            .cursors
            .get_mut(&id)
            .ok_or(Error::UnknownCursor { cursor: id })?;
        let available = entry.cursor.get_mut().count_remaining()?;
        Ok(match entry.remaining {
            Some(remaining) => available.min(remaining),
            None => available,
        })
    }

    /// Close and forget `id`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCursor` if `id` is not open, otherwise whatever the
    /// storage cursor's close returns. The id is forgotten either way.
    pub fn close(&self, id: CursorId) -> Result<()> {
        let (_, mut open) = self
            .cursors
            .remove(&id)
            .ok_or(Error::UnknownCursor { cursor: id })?;
        debug!(target: "docsession::cursor", cursor = %id, "cursor closed");
        open.cursor.get_mut().close()
    }

    /// Close every open cursor. Close failures are logged, not returned.
    pub fn close_all(&self) -> usize {
        let ids: Vec<CursorId> = self.cursors.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;
        for id in ids {
            if let Some((_, mut open)) = self.cursors.remove(&id) {
                if let Err(e) = open.cursor.get_mut().close() {
                    warn!(target: "docsession::cursor", cursor = %id, error = %e, "cursor close failed");
                }
                closed += 1;
            }
        }
        closed
    }

    /// Whether `id` is open
    pub fn contains(&self, id: CursorId) -> bool {
        self.cursors.contains_key(&id)
    }

    /// Number of open cursors
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Whether no cursor is open
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

impl std::fmt::Debug for CursorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorRegistry")
            .field("open", &self.cursors.len())
            .finish()
    }
}
