//! Common test utilities for executor integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use docsession::{
    Database, DbConnection, DbWrapper, DeleteOperation, DeleteResponse, DocumentCursor, Error,
    ExecutorConfig, ExecutorFactory, IndexedAttributes, InsertResponse, MaterializedCursor,
    NamedIndex, Projection, QueryCriteria, Result, SplitDocument, TickCounter, WriteFailMode,
};
use parking_lot::Mutex;

static TRACING: Once = Once::new();

/// Route library logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
                    .from_env_lossy(),
            )
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// SharedBackend - committed documents shared by every connection
// ============================================================================

#[derive(Default)]
pub struct SharedBackend {
    collections: Mutex<BTreeMap<String, Vec<SplitDocument>>>,
    indexes: Mutex<BTreeMap<String, Vec<NamedIndex>>>,
    acquired: AtomicUsize,
    closed: AtomicUsize,
}

impl SharedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn documents(&self, collection: &str) -> Vec<SplitDocument> {
        self.collections
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::Acquire)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::Acquire)
    }

    /// Connections checked out and not yet closed
    pub fn outstanding(&self) -> usize {
        self.acquired() - self.closed()
    }
}

/// Wrapper handing out connections to a [`SharedBackend`].
pub struct SharedWrapper(pub Arc<SharedBackend>);

impl DbWrapper for SharedWrapper {
    fn consume_session_connection(&self) -> Result<Box<dyn DbConnection>> {
        self.0.acquired.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(SharedConnection {
            backend: Arc::clone(&self.0),
            pending: Vec::new(),
        }))
    }
}

struct SharedConnection {
    backend: Arc<SharedBackend>,
    pending: Vec<(String, SplitDocument)>,
}

fn matches(document: &SplitDocument, filter: &QueryCriteria) -> bool {
    filter
        .as_json()
        .as_object()
        .map(|fields| fields.iter().all(|(k, v)| document.body.get(k) == Some(v)))
        .unwrap_or(false)
}

impl DbConnection for SharedConnection {
    fn query(
        &mut self,
        collection: &str,
        filter: &QueryCriteria,
        _projection: &Projection,
        max_results: usize,
    ) -> Result<Box<dyn DocumentCursor>> {
        let mut results: Vec<_> = self
            .backend
            .documents(collection)
            .into_iter()
            .filter(|d| matches(d, filter))
            .collect();
        if max_results > 0 {
            results.truncate(max_results);
        }
        Ok(Box::new(MaterializedCursor::new(results)))
    }

    fn get_databases(&mut self, database_name: &str) -> Result<Vec<Database>> {
        Ok(vec![Database {
            name: database_name.to_string(),
            size: 0,
        }])
    }

    fn insert_split_documents(
        &mut self,
        collection: &str,
        documents: Vec<SplitDocument>,
        _mode: WriteFailMode,
    ) -> Result<InsertResponse> {
        if collection.is_empty() {
            return Err(Error::implementation("collection name is empty"));
        }
        let inserted = documents.len();
        self.pending
            .extend(documents.into_iter().map(|d| (collection.to_string(), d)));
        Ok(InsertResponse {
            success: true,
            inserted,
            errors: Vec::new(),
        })
    }

    fn delete(
        &mut self,
        collection: &str,
        deletes: Vec<DeleteOperation>,
        _mode: WriteFailMode,
    ) -> Result<DeleteResponse> {
        let mut collections = self.backend.collections.lock();
        let documents = collections.entry(collection.to_string()).or_default();
        let before = documents.len();
        for op in &deletes {
            documents.retain(|d| !matches(d, &op.query));
        }
        Ok(DeleteResponse {
            success: true,
            deleted: before - documents.len(),
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
        let index = NamedIndex {
            name: index_name.to_string(),
            collection: collection.to_string(),
            attributes: attributes.clone(),
            unique,
        };
        self.backend
            .indexes
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(index.clone());
        Ok(index)
    }

    fn drop_index(&mut self, collection: &str, index_name: &str) -> Result<bool> {
        let mut indexes = self.backend.indexes.lock();
        let list = indexes.entry(collection.to_string()).or_default();
        let before = list.len();
        list.retain(|i| i.name != index_name);
        Ok(list.len() < before)
    }

    fn get_indexes(&mut self, collection: &str) -> Result<Vec<NamedIndex>> {
        Ok(self
            .backend
            .indexes
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn commit(&mut self) -> Result<()> {
        let mut collections = self.backend.collections.lock();
        for (collection, document) in self.pending.drain(..) {
            collections.entry(collection).or_default().push(document);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.backend.closed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

// ============================================================================
// Factories
// ============================================================================

pub struct TestServer {
    pub backend: Arc<SharedBackend>,
    pub ticks: Arc<TickCounter>,
    pub factory: ExecutorFactory,
}

pub fn create_server() -> TestServer {
    create_server_with(ExecutorConfig::default())
}

pub fn create_server_with(config: ExecutorConfig) -> TestServer {
    init_tracing();
    let backend = SharedBackend::new();
    let ticks = Arc::new(TickCounter::new());
    let factory = ExecutorFactory::builder(Arc::new(SharedWrapper(Arc::clone(&backend))))
        .config(config)
        .tick_monitor(ticks.clone())
        .build()
        .unwrap();
    TestServer {
        backend,
        ticks,
        factory,
    }
}

/// `n` documents `{"n": i, "tag": tag}` with ids starting at `first`.
pub fn tagged_docs(first: u64, n: u64, tag: &str) -> Vec<SplitDocument> {
    (first..first + n)
        .map(|i| SplitDocument::new(i, serde_json::json!({ "n": i, "tag": tag })))
        .collect()
}
