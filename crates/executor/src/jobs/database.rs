//! Session-scope jobs that do not touch cursors directly.

use std::sync::Arc;

use docsession_core::{Database, Result};
use tracing::{debug, warn};

use crate::cursor::CursorRegistry;
use crate::job::Job;
use crate::lazy::LazyConnection;
use crate::report::OperationKind;
use crate::tick::TickMonitor;

/// List the databases visible in the session's scope.
pub(crate) struct GetDatabasesJob {
    pub(crate) connection: Arc<LazyConnection>,
    pub(crate) database_name: String,
}

impl Job for GetDatabasesJob {
    type Output = Vec<Database>;

    fn kind(&self) -> OperationKind {
        OperationKind::GetDatabases
    }

    fn execute(self) -> Result<Vec<Database>> {
        self.connection
            .with(|conn| conn.get_databases(&self.database_name))
    }

    fn fallback(&self) -> Option<Vec<Database>> {
        Some(Vec::new())
    }
}

/// Park the worker until the shared tick reaches `tick`.
pub(crate) struct PauseJob {
    pub(crate) monitor: Arc<dyn TickMonitor>,
    pub(crate) tick: u64,
}

impl Job for PauseJob {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::PauseUntil
    }

    fn execute(self) -> Result<()> {
        debug!(target: "docsession::tick", tick = self.tick, "worker pausing");
        self.monitor.await_until(self.tick)
    }
}

/// Last job of a session: drop its cursors and release its connections.
pub(crate) struct ReleaseSessionJob {
    pub(crate) connection: Arc<LazyConnection>,
    pub(crate) cursors: Arc<CursorRegistry>,
    /// Connections of transactions that may not have been closed
    pub(crate) transactions: Vec<Arc<LazyConnection>>,
}

impl Job for ReleaseSessionJob {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::ReleaseSession
    }

    fn execute(self) -> Result<()> {
        let closed = self.cursors.close_all();
        if closed > 0 {
            debug!(target: "docsession::cursor", closed, "dropped cursors left open by session");
        }
        for connection in &self.transactions {
            // Idempotent, so transactions closed earlier are unaffected
            if let Err(e) = connection.release() {
                warn!(target: "docsession::connection", error = %e, "transaction connection release failed");
            }
        }
        self.connection.release()
    }
}
