//! Per-session dispatch.
//!
//! The dispatcher owns the session's worker lease. Every job goes through
//! [`SessionDispatcher::submit`], which wraps it in a [`PendingJob`]: the
//! adapter that runs the job body, contains whatever escapes it, lets the
//! exception handler decide the outcome, reports, and fulfils the caller's
//! handle. Nothing a job does can take the worker down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use docsession_core::{Error, Result, Session};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::exception::{ExceptionHandler, HandlerDecision, JobFailure};
use crate::handle::{JobCompleter, JobHandle};
use crate::job::{Job, JobContext};
use crate::pool::{Rejected, WorkItem, WorkerLease, WorkerPool};
use crate::report::{OperationKind, Report, ReportFactory, ReportOutcome};

/// A job bound to everything needed to run it on the worker.
struct PendingJob<J: Job> {
    job: J,
    completer: JobCompleter<J::Output>,
    recovery: Recovery,
}

/// The parts of a [`PendingJob`] still needed once the job body has run.
struct Recovery {
    context: JobContext,
    session: Session,
    handler: Arc<dyn ExceptionHandler>,
    report: Box<dyn Report>,
}

/// Run a report call. A panicking report is logged and otherwise ignored.
fn record(report: &mut dyn Report, session: &Session, call: impl FnOnce(&mut dyn Report)) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| call(report))) {
        warn!(
            target: "docsession::report",
            session = %session.id(),
            panic = %JobFailure::from_panic(payload),
            "report panicked"
        );
    }
}

impl Recovery {
    fn started(&mut self) {
        record(self.report.as_mut(), &self.session, |r| r.job_started());
    }

    fn finished(&mut self, outcome: ReportOutcome) {
        record(self.report.as_mut(), &self.session, |r| {
            r.job_finished(&outcome)
        });
    }

    /// Ask the handler what `failure` resolves to. A panicking handler
    /// counts as `Fail` with the failure's own error.
    fn decide(&self, failure: &JobFailure) -> HandlerDecision {
        let handler = &self.handler;
        catch_unwind(AssertUnwindSafe(|| {
            handler.handle(failure, &self.context, &self.session)
        }))
        .unwrap_or_else(|payload| {
            error!(
                target: "docsession::executor",
                session = %self.session.id(),
                op = self.context.kind.name(),
                panic = %JobFailure::from_panic(payload),
                "exception handler panicked"
            );
            HandlerDecision::Fail(failure.clone().into_error())
        })
    }

    fn recover<R>(&mut self, failure: JobFailure, fallback: Option<R>) -> Result<R> {
        match self.decide(&failure) {
            HandlerDecision::Fail(error) => {
                self.finished(ReportOutcome::Failed(error.to_string()));
                Err(error)
            }
            HandlerDecision::Fallback => match fallback {
                Some(value) => {
                    debug!(
                        target: "docsession::executor",
                        session = %self.session.id(),
                        op = self.context.kind.name(),
                        "substituted fallback for failed job"
                    );
                    self.finished(ReportOutcome::Fallback);
                    Ok(value)
                }
                None => {
                    let error = failure.into_error();
                    self.finished(ReportOutcome::Failed(error.to_string()));
                    Err(error)
                }
            },
        }
    }
}

impl<J: Job> PendingJob<J> {
    /// Resolve the handle without running the job.
    fn reject(mut self, error: Error) {
        self.recovery
            .finished(ReportOutcome::Rejected(error.to_string()));
        self.completer.complete(Err(error));
    }
}

impl<J: Job> WorkItem for PendingJob<J> {
    fn run(self: Box<Self>) {
        let PendingJob {
            job,
            completer,
            mut recovery,
        } = *self;

        recovery.started();
        let fallback = job.fallback();
        let result = match catch_unwind(AssertUnwindSafe(move || job.execute())) {
            Ok(Ok(value)) => {
                recovery.finished(ReportOutcome::Success);
                Ok(value)
            }
            Ok(Err(error)) => recovery.recover(JobFailure::Error(error), fallback),
            Err(payload) => recovery.recover(JobFailure::from_panic(payload), fallback),
        };
        completer.complete(result);
    }
}

/// Sequential dispatcher for one session.
pub(crate) struct SessionDispatcher {
    session: Session,
    pool: Arc<WorkerPool>,
    /// `None` once the session is closed
    lease: Mutex<Option<WorkerLease>>,
    handler: Arc<dyn ExceptionHandler>,
    reports: Arc<dyn ReportFactory>,
    sequence: AtomicU64,
}

impl SessionDispatcher {
    /// Lease a worker for `session`.
    pub(crate) fn new(
        session: Session,
        pool: Arc<WorkerPool>,
        handler: Arc<dyn ExceptionHandler>,
        reports: Arc<dyn ReportFactory>,
    ) -> Result<Self> {
        let lease = pool.acquire(&session)?;
        Ok(Self {
            session,
            pool,
            lease: Mutex::new(Some(lease)),
            handler,
            reports,
            sequence: AtomicU64::new(0),
        })
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    fn pending<J: Job>(&self, job: J) -> (PendingJob<J>, JobHandle<J::Output>) {
        let kind = job.kind();
        let (completer, handle) = JobHandle::channel();
        let pending = PendingJob {
            job,
            completer,
            recovery: Recovery {
                context: JobContext {
                    kind,
                    sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
                },
                session: self.session.clone(),
                handler: Arc::clone(&self.handler),
                report: self.reports.create_report(kind, &self.session),
            },
        };
        (pending, handle)
    }

    /// Queue `job` behind every job already submitted on this session.
    ///
    /// A closed session, a full queue or a shut-down pool yields a handle
    /// already resolved with the refusal.
    pub(crate) fn submit<J: Job>(&self, job: J) -> JobHandle<J::Output> {
        // Held across submission so sequence numbers follow queue order and
        // close cannot slip in between.
        let lease = self.lease.lock();
        let (pending, handle) = self.pending(job);
        match lease.as_ref() {
            None => {
                pending.reject(Error::task_execution(format!(
                    "session {} is closed",
                    self.session.id()
                )));
            }
            Some(lease) => {
                if let Err(Rejected { error, work }) = lease.submit(pending) {
                    warn!(
                        target: "docsession::executor",
                        session = %self.session.id(),
                        error = %error,
                        "job refused by worker"
                    );
                    work.reject(error);
                }
            }
        }
        handle
    }

    /// Refuse an operation without queueing anything. Still reported.
    pub(crate) fn reject<R>(&self, kind: OperationKind, error: Error) -> JobHandle<R> {
        let mut report = self.reports.create_report(kind, &self.session);
        let outcome = ReportOutcome::Rejected(error.to_string());
        record(report.as_mut(), &self.session, |r| r.job_finished(&outcome));
        JobHandle::rejected(error)
    }

    /// Queue `job` as the session's last job, then give the worker back to
    /// the pool.
    ///
    /// Returns `None` if the session was already closed. Already queued jobs
    /// still run, `job` after them.
    pub(crate) fn close_with<J: Job>(&self, job: J) -> Option<JobHandle<J::Output>> {
        let mut slot = self.lease.lock();
        let lease = slot.take()?;
        let (pending, handle) = self.pending(job);
        self.queue_cleanup(&lease, pending);
        self.pool.release(lease);
        debug!(target: "docsession::executor", session = %self.session.id(), "session closed");
        Some(handle)
    }

    /// Queue a job that releases resources, ignoring the queue bound.
    ///
    /// If the pool is shut down the job runs on the calling thread once the
    /// worker is idle, so its resources are still released. On a closed
    /// session the handle resolves to `TaskExecution`; the session's own
    /// cleanup has taken over.
    pub(crate) fn submit_cleanup<J: Job>(&self, job: J) -> JobHandle<J::Output> {
        let lease = self.lease.lock();
        let (pending, handle) = self.pending(job);
        match lease.as_ref() {
            None => pending.reject(Error::task_execution(format!(
                "session {} is closed",
                self.session.id()
            ))),
            Some(lease) => self.queue_cleanup(lease, pending),
        }
        handle
    }

    fn queue_cleanup<J: Job>(&self, lease: &WorkerLease, pending: PendingJob<J>) {
        if let Err(Rejected { error, work }) = lease.submit_unbounded(pending) {
            warn!(
                target: "docsession::executor",
                session = %self.session.id(),
                error = %error,
                "cleanup job refused by worker, running it inline"
            );
            // Nothing new reaches a refusing worker, so once it is idle
            // this thread is the only one left touching the session.
            lease.wait_idle();
            Box::new(work).run();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lease.lock().is_none()
    }

    /// Index of the leased worker, `None` once closed
    pub(crate) fn worker_index(&self) -> Option<usize> {
        self.lease.lock().as_ref().map(WorkerLease::index)
    }
}

impl Drop for SessionDispatcher {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.get_mut().take() {
            self.pool.release(lease);
        }
    }
}
