//! Per-operation instrumentation.
//!
//! Every call on the session façade creates exactly one [`Report`] through the
//! session's [`ReportFactory`]. The dispatcher tells the report when the job
//! starts and how it ended. Reports are write-only: nothing they do can change
//! a job's result.

use std::time::Instant;

use chrono::{DateTime, Utc};
use docsession_core::{Session, SessionId};
use tracing::debug;

/// The closed set of operations a session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Open a cursor over a query result
    Query,
    /// Read a batch from a cursor
    ReadCursor,
    /// Drain a cursor
    ReadAllCursor,
    /// Count unread documents of a cursor
    CountRemainingDocs,
    /// Close a cursor
    CloseCursor,
    /// List databases
    GetDatabases,
    /// Block the worker until a tick is reached
    PauseUntil,
    /// Release the session scope on executor close
    ReleaseSession,
    /// Commit a transaction
    Commit,
    /// Roll back a transaction
    Rollback,
    /// Release a transaction's connection
    CloseConnection,
    /// Insert documents
    Insert,
    /// Delete documents
    Delete,
    /// Create an index
    CreateIndex,
    /// Drop an index
    DropIndex,
    /// List indexes
    GetIndexes,
}

impl OperationKind {
    /// Stable lowercase name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::ReadCursor => "read_cursor",
            OperationKind::ReadAllCursor => "read_all_cursor",
            OperationKind::CountRemainingDocs => "count_remaining_docs",
            OperationKind::CloseCursor => "close_cursor",
            OperationKind::GetDatabases => "get_databases",
            OperationKind::PauseUntil => "pause_until",
            OperationKind::ReleaseSession => "release_session",
            OperationKind::Commit => "commit",
            OperationKind::Rollback => "rollback",
            OperationKind::CloseConnection => "close_connection",
            OperationKind::Insert => "insert",
            OperationKind::Delete => "delete",
            OperationKind::CreateIndex => "create_index",
            OperationKind::DropIndex => "drop_index",
            OperationKind::GetIndexes => "get_indexes",
        }
    }

    /// Whether the operation runs inside a transaction
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            OperationKind::Commit
                | OperationKind::Rollback
                | OperationKind::CloseConnection
                | OperationKind::Insert
                | OperationKind::Delete
                | OperationKind::CreateIndex
                | OperationKind::DropIndex
                | OperationKind::GetIndexes
        )
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a reported job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The job produced a result
    Success,
    /// The exception handler substituted the job's fallback value
    Fallback,
    /// The job failed with this message
    Failed(String),
    /// The job was never queued
    Rejected(String),
}

/// Instrumentation record for one operation invocation.
pub trait Report: Send {
    /// The worker picked the job up
    fn job_started(&mut self);

    /// The job's result is known
    fn job_finished(&mut self, outcome: &ReportOutcome);
}

/// Creates one [`Report`] per operation invocation.
pub trait ReportFactory: Send + Sync {
    /// Create the report for an operation submitted on `session`
    fn create_report(&self, kind: OperationKind, session: &Session) -> Box<dyn Report>;
}

/// Reports that emit one `tracing` event per finished operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReportFactory;

impl ReportFactory for TracingReportFactory {
    fn create_report(&self, kind: OperationKind, session: &Session) -> Box<dyn Report> {
        Box::new(TracingReport {
            kind,
            session: session.id(),
            submitted_at: Utc::now(),
            submitted: Instant::now(),
            started: None,
        })
    }
}

struct TracingReport {
    kind: OperationKind,
    session: SessionId,
    submitted_at: DateTime<Utc>,
    submitted: Instant,
    started: Option<Instant>,
}

impl Report for TracingReport {
    fn job_started(&mut self) {
        self.started = Some(Instant::now());
    }

    fn job_finished(&mut self, outcome: &ReportOutcome) {
        let now = Instant::now();
        let started = self.started.unwrap_or(now);
        debug!(
            target: "docsession::report",
            op = self.kind.name(),
            session = %self.session,
            submitted_at = %self.submitted_at.to_rfc3339(),
            queued_us = started.duration_since(self.submitted).as_micros() as u64,
            run_us = now.duration_since(started).as_micros() as u64,
            outcome = ?outcome,
            "operation finished"
        );
    }
}

/// Reports that record nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReportFactory;

struct NoopReport;

impl Report for NoopReport {
    fn job_started(&mut self) {}

    fn job_finished(&mut self, _outcome: &ReportOutcome) {}
}

impl ReportFactory for NoopReportFactory {
    fn create_report(&self, _kind: OperationKind, _session: &Session) -> Box<dyn Report> {
        Box::new(NoopReport)
    }
}
