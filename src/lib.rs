//! docsession - Session execution core for a document database server
//!
//! Every client session gets a dedicated worker leased from a shared pool.
//! Queries, cursor reads, batch writes, index management and transaction
//! control are submitted as jobs, run strictly in submission order, and
//! answered through awaitable [`JobHandle`]s.
//!
//! # Quick Start
//!
//! ```ignore
//! use docsession::{ExecutorFactory, Session, WriteFailMode};
//!
//! let factory = ExecutorFactory::new(wrapper)?;
//! let executor = factory.open_session(Session::new())?;
//!
//! let txn = executor.create_transaction();
//! txn.insert_split_documents("users", documents, WriteFailMode::Ordered).wait()?;
//! txn.commit().wait()?;
//! ```
//!
//! # Architecture
//!
//! The storage engine is reached only through the [`DbWrapper`] /
//! [`DbConnection`] traits, so any backend can sit behind the executor.
//! Only the executor API is public.

// Re-export the public API from docsession-executor
pub use docsession_executor::*;
