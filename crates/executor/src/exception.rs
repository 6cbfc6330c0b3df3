//! Session-wide exception handling.
//!
//! Whatever escapes a job body, a returned error or a panic, is captured by
//! the dispatcher as a [`JobFailure`] and handed to the session's
//! [`ExceptionHandler`], which decides what the caller's handle resolves to.

use std::any::Any;

use docsession_core::{Error, Session};
use tracing::{debug, error};

use crate::job::JobContext;

/// Something that escaped a job body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The job returned an error
    Error(Error),
    /// The job panicked with this message
    Panic(String),
}

impl JobFailure {
    /// Capture a panic payload from `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "(non-string panic)".to_string()
        };
        JobFailure::Panic(message)
    }

    /// The typed error this failure maps to when nothing overrides it.
    pub fn into_error(self) -> Error {
        match self {
            JobFailure::Error(e) => e,
            JobFailure::Panic(message) => {
                Error::task_execution(format!("job panicked: {}", message))
            }
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobFailure::Error(e) => write!(f, "{}", e),
            JobFailure::Panic(message) => write!(f, "panic: {}", message),
        }
    }
}

/// What the caller's handle resolves to after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerDecision {
    /// Resolve with this error
    Fail(Error),
    /// Resolve with the job's fallback value, or the original error if the
    /// job has none
    Fallback,
}

/// Decides the externally visible outcome of failed jobs.
pub trait ExceptionHandler: Send + Sync {
    /// Handle one failure of the job described by `job` on `session`
    fn handle(&self, failure: &JobFailure, job: &JobContext, session: &Session)
        -> HandlerDecision;
}

/// Passes typed errors through and turns panics into `TaskExecution`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExceptionHandler;

impl ExceptionHandler for DefaultExceptionHandler {
    fn handle(
        &self,
        failure: &JobFailure,
        job: &JobContext,
        session: &Session,
    ) -> HandlerDecision {
        match failure {
            JobFailure::Error(e) => {
                debug!(
                    target: "docsession::executor",
                    session = %session.id(),
                    op = job.kind.name(),
                    seq = job.sequence,
                    error = %e,
                    "job failed"
                );
            }
            JobFailure::Panic(message) => {
                error!(
                    target: "docsession::executor",
                    session = %session.id(),
                    op = job.kind.name(),
                    seq = job.sequence,
                    "job panicked: {}",
                    message
                );
            }
        }
        HandlerDecision::Fail(failure.clone().into_error())
    }
}
