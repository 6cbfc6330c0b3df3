//! In-memory storage backend for executor tests.
//!
//! [`MemoryStore`] holds committed collections and indexes and logs every
//! connection call. [`MemoryWrapper`] hands out [`MemoryConnection`]s over one
//! store and counts acquisitions.
//!
//! Scripted failures:
//! - collection `"broken"`: every call fails with `ImplementationFailure`
//! - collection `"panic"`: every call panics
//! - a document whose body is `{"fail": true}` is rejected as a write error

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use crate::{
    Database, DbConnection, DbWrapper, DeleteOperation, DeleteResponse, DocumentCursor, Error,
    IndexedAttributes, InsertResponse, MaterializedCursor, NamedIndex, Projection,
    QueryCriteria, Result, SplitDocument, WriteError, WriteFailMode,
};

/// Collection whose every operation fails.
pub const BROKEN: &str = "broken";
/// Collection whose every operation panics.
pub const PANICS: &str = "panic";

/// Error code reported for rejected documents.
pub const REJECTED_CODE: i32 = 11000;

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Vec<SplitDocument>>>,
    indexes: Mutex<BTreeMap<String, Vec<NamedIndex>>>,
    ops: Mutex<Vec<String>>,
    closed_connections: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Committed documents of `collection`, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<SplitDocument> {
        self.collections
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Seed committed documents directly
    pub fn seed(&self, collection: &str, documents: Vec<SplitDocument>) {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    /// Every connection call so far, as `"op"` or `"op:collection"`
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    /// Number of logged calls named `op`
    pub fn count_ops(&self, op: &str) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|o| o.as_str() == op || o.starts_with(&format!("{}:", op)))
            .count()
    }

    pub fn closed_connections(&self) -> usize {
        self.closed_connections.load(Ordering::Acquire)
    }

    fn log(&self, op: impl Into<String>) {
        self.ops.lock().push(op.into());
    }
}

/// `n` documents `{"n": i}` with ids starting at `first`.
pub fn docs(first: u64, n: u64) -> Vec<SplitDocument> {
    (first..first + n)
        .map(|i| SplitDocument::new(i, serde_json::json!({ "n": i })))
        .collect()
}

/// A document the store rejects.
pub fn rejected_doc(id: u64) -> SplitDocument {
    SplitDocument::new(id, serde_json::json!({ "fail": true }))
}

pub fn ids(documents: &[SplitDocument]) -> Vec<u64> {
    documents.iter().map(|d| d.id).collect()
}

// =============================================================================
// Wrapper
// =============================================================================

#[derive(Default)]
pub struct MemoryWrapper {
    store: Arc<MemoryStore>,
    acquisitions: AtomicUsize,
    failure: Mutex<Option<Error>>,
}

impl MemoryWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::Acquire)
    }

    /// Make every later acquisition fail with `error`
    pub fn fail_acquisition(&self, error: Error) {
        *self.failure.lock() = Some(error);
    }
}

impl DbWrapper for MemoryWrapper {
    fn consume_session_connection(&self) -> Result<Box<dyn DbConnection>> {
        self.acquisitions.fetch_add(1, Ordering::AcqRel);
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(Box::new(MemoryConnection {
            store: Arc::clone(&self.store),
            pending: Vec::new(),
            closed: false,
        }))
    }
}

// =============================================================================
// Connection
// =============================================================================

enum PendingWrite {
    Insert(String, Vec<SplitDocument>),
    Delete(String, Vec<DeleteOperation>),
}

pub struct MemoryConnection {
    store: Arc<MemoryStore>,
    pending: Vec<PendingWrite>,
    closed: bool,
}

fn matches_filter(document: &SplitDocument, filter: &QueryCriteria) -> bool {
    match filter.as_json() {
        JsonValue::Object(fields) => fields
            .iter()
            .all(|(key, value)| document.body.get(key) == Some(value)),
        _ => false,
    }
}

fn project(document: SplitDocument, projection: &Projection) -> SplitDocument {
    match (projection.as_json(), &document.body) {
        (JsonValue::Object(keep), JsonValue::Object(body)) if !keep.is_empty() => {
            let body = body
                .iter()
                .filter(|(key, _)| keep.get(*key).map_or(false, |v| v != &JsonValue::Bool(false)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            SplitDocument::new(document.id, JsonValue::Object(body))
        }
        _ => document,
    }
}

fn is_rejected(document: &SplitDocument) -> bool {
    document.body.get("fail") == Some(&JsonValue::Bool(true))
}

impl MemoryConnection {
    fn enter(&self, op: &str, collection: Option<&str>) -> Result<()> {
        match collection {
            Some(c) => self.store.log(format!("{}:{}", op, c)),
            None => self.store.log(op),
        }
        if self.closed {
            return Err(Error::implementation("connection is closed"));
        }
        match collection {
            Some(BROKEN) => Err(Error::implementation("collection 'broken' is unavailable")),
            Some(PANICS) => panic!("storage panicked on collection '{}'", PANICS),
            _ => Ok(()),
        }
    }
}

impl DbConnection for MemoryConnection {
    fn query(
        &mut self,
        collection: &str,
        filter: &QueryCriteria,
        projection: &Projection,
        max_results: usize,
    ) -> Result<Box<dyn DocumentCursor>> {
        self.enter("query", Some(collection))?;
        let mut results: Vec<SplitDocument> = self
            .store
            .documents(collection)
            .into_iter()
            .filter(|d| matches_filter(d, filter))
            .map(|d| project(d, projection))
            .collect();
        if max_results > 0 {
            results.truncate(max_results);
        }
        Ok(Box::new(MaterializedCursor::new(results)))
    }

    fn get_databases(&mut self, database_name: &str) -> Result<Vec<Database>> {
        self.enter("get_databases", None)?;
        let size = self
            .store
            .collections
            .lock()
            .values()
            .map(|docs| docs.len() as u64)
            .sum();
        Ok(vec![Database {
            name: database_name.to_string(),
            size,
        }])
    }

    fn insert_split_documents(
        &mut self,
        collection: &str,
        documents: Vec<SplitDocument>,
        mode: WriteFailMode,
    ) -> Result<InsertResponse> {
        self.enter("insert", Some(collection))?;
        let mut accepted = Vec::new();
        let mut errors = Vec::new();
        for (index, document) in documents.into_iter().enumerate() {
            if is_rejected(&document) {
                errors.push(WriteError {
                    index,
                    code: REJECTED_CODE,
                    message: format!("document {} rejected", document.id),
                });
                if mode == WriteFailMode::Ordered {
                    break;
                }
            } else {
                accepted.push(document);
            }
        }
        if mode == WriteFailMode::Transactional && !errors.is_empty() {
            accepted.clear();
        }
        let inserted = accepted.len();
        if !accepted.is_empty() {
            self.pending
                .push(PendingWrite::Insert(collection.to_string(), accepted));
        }
        Ok(InsertResponse {
            success: errors.is_empty(),
            inserted,
            errors,
        })
    }

    fn delete(
        &mut self,
        collection: &str,
        deletes: Vec<DeleteOperation>,
        _mode: WriteFailMode,
    ) -> Result<DeleteResponse> {
        self.enter("delete", Some(collection))?;
        let documents = self.store.documents(collection);
        let deleted = deletes
            .iter()
            .map(|op| {
                let matched = documents.iter().filter(|d| matches_filter(d, &op.query)).count();
                if op.just_one {
                    matched.min(1)
                } else {
                    matched
                }
            })
            .sum();
        self.pending
            .push(PendingWrite::Delete(collection.to_string(), deletes));
        Ok(DeleteResponse {
            success: true,
            deleted,
            errors: Vec::new(),
        })
    }

    fn create_index(
        &mut self,
        collection: &str,
        index_name: &str,
        attributes: &IndexedAttributes,
        unique: bool,
        _blocking: bool,
    ) -> Result<NamedIndex> {
        self.enter("create_index", Some(collection))?;
        let mut indexes = self.store.indexes.lock();
        let existing = indexes.entry(collection.to_string()).or_default();
        if existing.iter().any(|i| i.name == index_name) {
            return Err(Error::implementation(format!(
                "index '{}' already exists on '{}'",
                index_name, collection
            )));
        }
        let index = NamedIndex {
            name: index_name.to_string(),
            collection: collection.to_string(),
            attributes: attributes.clone(),
            unique,
        };
        existing.push(index.clone());
        Ok(index)
    }

    fn drop_index(&mut self, collection: &str, index_name: &str) -> Result<bool> {
        self.enter("drop_index", Some(collection))?;
        let mut indexes = self.store.indexes.lock();
        let Some(existing) = indexes.get_mut(collection) else {
            return Ok(false);
        };
        let before = existing.len();
        existing.retain(|i| i.name != index_name);
        Ok(existing.len() < before)
    }

    fn get_indexes(&mut self, collection: &str) -> Result<Vec<NamedIndex>> {
        self.enter("get_indexes", Some(collection))?;
        Ok(self
            .store
            .indexes
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn commit(&mut self) -> Result<()> {
        self.enter("commit", None)?;
        let mut collections = self.store.collections.lock();
        for write in self.pending.drain(..) {
            match write {
                PendingWrite::Insert(collection, documents) => {
                    collections.entry(collection).or_default().extend(documents);
                }
                PendingWrite::Delete(collection, deletes) => {
                    let Some(documents) = collections.get_mut(&collection) else {
                        continue;
                    };
                    for op in deletes {
                        if op.just_one {
                            if let Some(pos) =
                                documents.iter().position(|d| matches_filter(d, &op.query))
                            {
                                documents.remove(pos);
                            }
                        } else {
                            documents.retain(|d| !matches_filter(d, &op.query));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.enter("rollback", None)?;
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.enter("close", None)?;
        self.pending.clear();
        self.closed = true;
        self.store.closed_connections.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
