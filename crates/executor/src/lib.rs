//! # docsession executor
//!
//! Runs client operations of a document-database server against its storage
//! connections, one session at a time, strictly in order.
//!
//! - [`ExecutorFactory`] - wires a storage backend to a shared worker pool
//! - [`SessionExecutor`] - one session: queries, cursors, database listing
//! - [`SessionTransaction`] - writes, index management, commit/rollback
//! - [`JobHandle`] - the asynchronous result every operation returns
//!
//! ## Quick Start
//!
//! ```text
//! use docsession_executor::{ExecutorFactory, Session, WriteFailMode};
//!
//! let factory = ExecutorFactory::new(wrapper)?;
//! let executor = factory.open_session(Session::new())?;
//!
//! let txn = executor.create_transaction();
//! txn.insert_split_documents("users", documents, WriteFailMode::Ordered).wait()?;
//! txn.commit().wait()?;
//! txn.close();
//! executor.close().wait()?;
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | How |
//! |-----------|-----|
//! | **Ordering** | one leased worker per session, FIFO queue |
//! | **Isolation** | every job body runs under `catch_unwind`; failures go to the [`ExceptionHandler`] |
//! | **Poisoning** | a failed transactional job aborts its transaction; only rollback and close still run |
//! | **Laziness** | connections are acquired by the first job that needs one |

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod cursor;
mod dispatch;
mod exception;
mod executor;
mod factory;
mod handle;
mod job;
mod jobs;
mod lazy;
mod pool;
mod report;
mod tick;
mod transaction;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API - Everything users need is re-exported here
// =============================================================================

pub use config::{CursorConfig, ExecutorConfig, PoolConfig, CONFIG_FILE_NAME};
pub use cursor::CursorRegistry;
pub use exception::{DefaultExceptionHandler, ExceptionHandler, HandlerDecision, JobFailure};
pub use executor::SessionExecutor;
pub use factory::{ExecutorFactory, ExecutorFactoryBuilder};
pub use handle::JobHandle;
pub use job::{Job, JobContext, TransactionAborter, TransactionalAction, TransactionalJob};
pub use lazy::LazyConnection;
pub use pool::{PoolStats, WorkerLease, WorkerPool};
pub use report::{NoopReportFactory, OperationKind, Report, ReportFactory, ReportOutcome, TracingReportFactory};
pub use tick::{TickCounter, TickMonitor};
pub use transaction::SessionTransaction;

// Re-export the shared vocabulary so users don't need docsession-core directly
pub use docsession_core::{
    AttributeReference, CursorId, Database, DbConnection, DbWrapper, DeleteOperation,
    DeleteResponse, DocumentCursor, Error, IndexedAttributes, IndexedAttributesBuilder,
    InsertResponse, MaterializedCursor, NamedIndex, Projection, QueryCriteria, Session, SessionId,
    SplitDocument, WriteError, WriteFailMode,
};

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, Error>;
