//! Core types and traits for docsession
//!
//! This crate defines the vocabulary shared by the executor and the storage
//! backends it drives:
//! - Error: the failure taxonomy surfaced through job handles
//! - Types: session identity, cursor ids, attribute paths, documents, write outcomes
//! - IndexedAttributes: immutable index descriptions
//! - Traits: the storage collaborators (DbWrapper, DbConnection, DocumentCursor)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use index::{IndexedAttributes, IndexedAttributesBuilder, NamedIndex};
pub use traits::{DbConnection, DbWrapper, DocumentCursor, MaterializedCursor};
pub use types::{
    AttributeReference, CursorId, Database, DeleteOperation, DeleteResponse, InsertResponse,
    Projection, QueryCriteria, Session, SessionId, SplitDocument, WriteError, WriteFailMode,
};
