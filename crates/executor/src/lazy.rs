//! Lazy connection acquisition.
//!
//! Executors and transactions are created eagerly, but many sessions never
//! run a data operation. [`LazyConnection`] defers checking a connection out
//! of the [`DbWrapper`] until the first job needs one, then memoizes it.
//! If acquisition fails, the failure is cached as well and never retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docsession_core::{DbConnection, DbWrapper, Error, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

type Slot = std::result::Result<Mutex<Box<dyn DbConnection>>, Error>;

/// Deferred, memoized access to one storage connection.
pub struct LazyConnection {
    wrapper: Arc<dyn DbWrapper>,
    connection: OnceCell<Slot>,
    released: AtomicBool,
}

impl LazyConnection {
    /// Wrap a connection source. Nothing is acquired yet.
    pub fn new(wrapper: Arc<dyn DbWrapper>) -> Self {
        Self {
            wrapper,
            connection: OnceCell::new(),
            released: AtomicBool::new(false),
        }
    }

    fn slot(&self) -> &Slot {
        self.connection.get_or_init(|| {
            debug!(target: "docsession::connection", "acquiring connection");
            self.wrapper
                .consume_session_connection()
                .map(Mutex::new)
                .map_err(|e| {
                    warn!(target: "docsession::connection", error = %e, "connection acquisition failed");
                    match e {
                        Error::ImplementationFailure { .. } => e,
                        other => Error::implementation(other.to_string()),
                    }
                })
        })
    }

    /// Run `f` against the connection, acquiring it on first use.
    ///
    /// # Errors
    ///
    /// Returns `ImplementationFailure` if acquisition failed (now or on an
    /// earlier call) or the connection was already released, otherwise
    /// whatever `f` returns.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn DbConnection) -> Result<R>) -> Result<R> {
        if self.released.load(Ordering::Acquire) {
            return Err(Error::implementation("connection already released"));
        }
        match self.slot() {
            Ok(connection) => {
                let mut connection = connection.lock();
                f(&mut **connection)
            }
            Err(e) => Err(e.clone()),
        }
    }

    /// Whether a connection was successfully acquired
    pub fn is_acquired(&self) -> bool {
        matches!(self.connection.get(), Some(Ok(_)))
    }

    /// Whether [`release`](Self::release) was called
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Give the connection back to its provider.
    ///
    /// Idempotent. A connection that was never acquired is not acquired
    /// just to be released.
    pub fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.connection.get() {
            Some(Ok(connection)) => {
                debug!(target: "docsession::connection", "releasing connection");
                connection.lock().close()
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for LazyConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyConnection")
            .field("acquired", &self.is_acquired())
            .field("released", &self.is_released())
            .finish()
    }
}
