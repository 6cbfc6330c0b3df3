//! Completion handles.
//!
//! Every submission returns a [`JobHandle`] paired one-to-one with a
//! [`JobCompleter`] that the worker fulfils exactly once. Callers can block on
//! the handle, poll it, or `.await` it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use docsession_core::{Error, Result};
use tokio::sync::oneshot;

/// Caller side of a submitted job.
#[must_use = "a JobHandle carries the job's only result"]
#[derive(Debug)]
pub struct JobHandle<R> {
    rx: oneshot::Receiver<Result<R>>,
}

/// Worker side of a submitted job. Consumed by [`complete`](Self::complete).
#[derive(Debug)]
pub(crate) struct JobCompleter<R> {
    tx: oneshot::Sender<Result<R>>,
}

fn dropped() -> Error {
    Error::task_execution("job was dropped before it completed")
}

impl<R> JobHandle<R> {
    /// Create a connected handle / completer pair.
    pub(crate) fn channel() -> (JobCompleter<R>, JobHandle<R>) {
        let (tx, rx) = oneshot::channel();
        (JobCompleter { tx }, JobHandle { rx })
    }

    /// A handle that is already resolved.
    pub fn ready(result: Result<R>) -> Self {
        let (completer, handle) = Self::channel();
        completer.complete(result);
        handle
    }

    /// A handle for a submission that was refused.
    pub fn rejected(error: Error) -> Self {
        Self::ready(Err(error))
    }

    /// Block the calling thread until the job's result is known.
    ///
    /// Must not be called from inside an async runtime; `.await` the handle
    /// there instead. A job dropped without running (for example because its
    /// pool shut down) resolves to `TaskExecution`.
    pub fn wait(self) -> Result<R> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(dropped()))
    }

    /// Take the result if it is already known.
    ///
    /// Returns `None` while the job is still queued or running.
    pub fn try_result(&mut self) -> Option<Result<R>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(dropped())),
        }
    }
}

impl<R> JobCompleter<R> {
    /// Fulfil the handle. A handle the caller already dropped is ignored.
    pub(crate) fn complete(self, result: Result<R>) {
        let _ = self.tx.send(result);
    }
}

impl<R> Future for JobHandle<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(dropped())))
    }
}
