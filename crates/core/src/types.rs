//! Core types for session execution
//!
//! This module defines the values that flow between the executor and the
//! storage connection:
//! - SessionId / Session: identity of the client session a worker is leased to
//! - CursorId: opaque id of a server-side cursor
//! - AttributeReference: dotted attribute path inside a document
//! - SplitDocument, Database: payloads returned by the storage connection
//! - QueryCriteria, Projection, DeleteOperation: opaque operation inputs
//! - WriteFailMode, InsertResponse, DeleteResponse: write outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a SessionId from its string form.
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A client session: the unit a worker and a connection scope are leased to.
///
/// Opaque to the executor beyond its identity. The optional label is only
/// used in log output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    label: Option<String>,
}

impl Session {
    /// Create a session with a fresh id
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            label: None,
        }
    }

    /// Create a session with a fresh id and a human readable label
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            label: Some(label.into()),
        }
    }

    /// The session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The label, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", label, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Opaque identifier of a server-side cursor.
///
/// Chosen by the caller when the query is issued and used by every later
/// read on the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CursorId(u64);

impl CursorId {
    /// Wrap a raw cursor id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path to an attribute inside a document, e.g. `address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeReference {
    keys: Vec<String>,
}

impl AttributeReference {
    /// Build a reference from its path segments.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if there are no segments or one is empty.
    pub fn from_keys<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(Error::illegal_argument("attribute reference has no keys"));
        }
        if keys.iter().any(|k| k.is_empty()) {
            return Err(Error::illegal_argument(format!(
                "attribute reference '{}' has an empty key",
                keys.join(".")
            )));
        }
        Ok(Self { keys })
    }

    /// Parse a dotted path
    pub fn parse(path: &str) -> Result<Self> {
        Self::from_keys(path.split('.'))
    }

    /// The path segments
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl FromStr for AttributeReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AttributeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join("."))
    }
}

/// A stored document as handed back by the storage connection.
///
/// How the document is split into storage rows is the connection's business;
/// the executor only moves these values around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDocument {
    /// Storage-assigned document id
    pub id: u64,
    /// Document body
    pub body: serde_json::Value,
}

impl SplitDocument {
    /// Create a document
    pub fn new(id: u64, body: serde_json::Value) -> Self {
        Self { id, body }
    }
}

/// A database visible in the connection scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    /// Database name
    pub name: String,
    /// Approximate size in bytes
    pub size: u64,
}

/// Query filter, evaluated by the storage connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCriteria(serde_json::Value);

impl QueryCriteria {
    /// Wrap a filter document
    pub fn new(filter: serde_json::Value) -> Self {
        Self(filter)
    }

    /// Filter matching every document
    pub fn all() -> Self {
        Self(serde_json::Value::Object(Default::default()))
    }

    /// The filter document
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Projection applied to query results, evaluated by the storage connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection(serde_json::Value);

impl Projection {
    /// Wrap a projection document
    pub fn new(projection: serde_json::Value) -> Self {
        Self(projection)
    }

    /// Projection returning whole documents
    pub fn all() -> Self {
        Self(serde_json::Value::Object(Default::default()))
    }

    /// The projection document
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// One delete in a delete batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOperation {
    /// Documents to delete
    pub query: QueryCriteria,
    /// Delete only the first match
    pub just_one: bool,
}

/// Partial-failure policy for batch writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WriteFailMode {
    /// Stop at the first failing item and report per item.
    #[default]
    Ordered,
    /// Keep going past failing items and report per item.
    IsolatedDocument,
    /// The batch succeeds or fails as a whole. Any failure aborts the
    /// enclosing transaction.
    Transactional,
}

impl WriteFailMode {
    /// Whether a failed item poisons the whole transaction
    pub fn aborts_transaction(&self) -> bool {
        matches!(self, WriteFailMode::Transactional)
    }
}

/// Failure of one item in a batch write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteError {
    /// Position of the item in the batch
    pub index: usize,
    /// Storage error code
    pub code: i32,
    /// Storage error message
    pub message: String,
}

/// Outcome of an insert batch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsertResponse {
    /// True if every document was inserted
    pub success: bool,
    /// Number of documents inserted
    pub inserted: usize,
    /// Per-item failures
    pub errors: Vec<WriteError>,
}

/// Outcome of a delete batch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// True if every delete operation succeeded
    pub success: bool,
    /// Number of documents deleted
    pub deleted: usize,
    /// Per-item failures
    pub errors: Vec<WriteError>,
}
