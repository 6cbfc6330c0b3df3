//! Shared pool of sequential session workers.
//!
//! Each worker is one thread draining its own FIFO queue. A session leases a
//! worker for its whole lifetime, so every job of that session runs in
//! submission order and never concurrently with another of its jobs. Released
//! workers go back to an idle list and are reused by later sessions. The pool
//! is sized independently of the number of sessions.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use docsession_core::{Error, Result, Session, SessionId};
use once_cell::sync::OnceCell;
use tracing::{debug, error};

use crate::config::PoolConfig;

/// Pool metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads spawned so far.
    pub worker_count: usize,
    /// Workers currently leased to a session.
    pub leased: usize,
    /// Workers waiting for a session.
    pub idle: usize,
    /// Tasks queued across all workers.
    pub queue_depth: usize,
    /// Total number of tasks completed since pool creation.
    pub tasks_completed: u64,
}

/// Something a worker can run.
///
/// Closures are work items; the dispatcher uses its own type so a refused
/// submission hands the job back intact.
pub(crate) trait WorkItem: Send + 'static {
    fn run(self: Box<Self>);
}

impl<F: FnOnce() + Send + 'static> WorkItem for F {
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// A work item the worker refused, handed back with the reason.
pub(crate) struct Rejected<W> {
    pub(crate) error: Error,
    pub(crate) work: W,
}

impl<W> std::fmt::Debug for Rejected<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish()
    }
}

type Task = Box<dyn WorkItem>;

struct WorkerSlot {
    index: usize,
    queue: Mutex<VecDeque<Task>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    active: AtomicBool,
    queue_depth: AtomicUsize,
    max_queue_depth: usize,
    tasks_completed: AtomicU64,
    thread: OnceCell<ThreadId>,
}

impl WorkerSlot {
    fn submit<W: WorkItem>(&self, work: W, bounded: bool) -> std::result::Result<(), Rejected<W>> {
        {
            let mut queue = self.queue.lock();
            // Checked under the queue lock: a worker only exits on shutdown
            // once its queue is empty, so an accepted task always runs.
            if self.shutdown.load(Ordering::Acquire) {
                return Err(Rejected {
                    error: Error::task_execution("worker pool is shut down"),
                    work,
                });
            }
            if bounded && queue.len() >= self.max_queue_depth {
                return Err(Rejected {
                    error: Error::task_execution(format!(
                        "worker {} queue is full ({} tasks)",
                        self.index, self.max_queue_depth
                    )),
                    work,
                });
            }
            queue.push_back(Box::new(work));
            self.queue_depth.fetch_add(1, Ordering::Release);
        }

        self.work_ready.notify_one();
        Ok(())
    }

    fn drain(&self) {
        let mut queue = self.queue.lock();
        while self.queue_depth.load(Ordering::Acquire) > 0 || self.active.load(Ordering::Acquire) {
            self.drain_cond.wait(&mut queue);
        }
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        // Notify under the queue lock so a worker between its shutdown check
        // and its wait cannot miss the wakeup.
        let _queue = self.queue.lock();
        self.work_ready.notify_all();
    }
}

struct PoolState {
    slots: Vec<Arc<WorkerSlot>>,
    idle: Vec<usize>,
    leased: usize,
    handles: Vec<JoinHandle<()>>,
    shut_down: bool,
}

/// Pool of sequential workers leased to sessions.
pub struct WorkerPool {
    state: Mutex<PoolState>,
    config: PoolConfig,
}

/// Exclusive lease of one worker by one session.
///
/// Not `Clone`: the only way to give the worker back is
/// [`WorkerPool::release`], which consumes the lease.
pub struct WorkerLease {
    slot: Arc<WorkerSlot>,
    session: SessionId,
}

impl WorkerLease {
    /// Index of the leased worker in the pool's worker table
    pub fn index(&self) -> usize {
        self.slot.index
    }

    /// Session holding the lease
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Queue `work` behind everything already submitted to this worker.
    ///
    /// Refused with `TaskExecution` if the queue is full or the pool is shut
    /// down.
    pub(crate) fn submit<W: WorkItem>(&self, work: W) -> std::result::Result<(), Rejected<W>> {
        self.slot.submit(work, true)
    }

    /// Like [`submit`](Self::submit) but ignores the queue bound. Used for
    /// the one cleanup job a session enqueues when it closes.
    pub(crate) fn submit_unbounded<W: WorkItem>(
        &self,
        work: W,
    ) -> std::result::Result<(), Rejected<W>> {
        self.slot.submit(work, false)
    }

    /// Block until the worker has run everything queued on it.
    ///
    /// Returns immediately when called from the worker itself.
    pub(crate) fn wait_idle(&self) {
        if self.slot.thread.get() == Some(&std::thread::current().id()) {
            return;
        }
        self.slot.drain();
    }

    /// Tasks waiting on this worker
    pub fn queue_depth(&self) -> usize {
        self.slot.queue_depth.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for WorkerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLease")
            .field("index", &self.slot.index)
            .field("session", &self.session)
            .finish()
    }
}

impl WorkerPool {
    /// Create an empty pool. Worker threads are spawned on demand, up to
    /// `config.max_workers`.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            state: Mutex::new(PoolState {
                slots: Vec::with_capacity(config.max_workers),
                idle: Vec::new(),
                leased: 0,
                handles: Vec::with_capacity(config.max_workers),
                shut_down: false,
            }),
            config,
        }
    }

    /// Lease a worker to `session`.
    ///
    /// Reuses an idle worker if there is one, otherwise spawns a new thread.
    ///
    /// # Errors
    ///
    /// Returns `TaskExecution` if the pool is shut down, every worker is
    /// leased, or the worker thread cannot be spawned.
    pub fn acquire(&self, session: &Session) -> Result<WorkerLease> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(Error::task_execution("worker pool is shut down"));
        }

        let slot = match state.idle.pop() {
            Some(index) => Arc::clone(&state.slots[index]),
            None => {
                if state.slots.len() >= self.config.max_workers {
                    return Err(Error::task_execution(format!(
                        "worker pool exhausted: all {} workers are leased",
                        self.config.max_workers
                    )));
                }
                let index = state.slots.len();
                let slot = Arc::new(WorkerSlot {
                    index,
                    queue: Mutex::new(VecDeque::new()),
                    work_ready: Condvar::new(),
                    drain_cond: Condvar::new(),
                    shutdown: AtomicBool::new(false),
                    active: AtomicBool::new(false),
                    queue_depth: AtomicUsize::new(0),
                    max_queue_depth: self.config.queue_capacity,
                    tasks_completed: AtomicU64::new(0),
                    thread: OnceCell::new(),
                });
                let worker = Arc::clone(&slot);
                let handle = std::thread::Builder::new()
                    .name(format!("{}-{}", self.config.thread_name_prefix, index))
                    .spawn(move || worker_loop(&worker))
                    .map_err(|e| {
                        Error::task_execution(format!("failed to spawn session worker: {}", e))
                    })?;
                state.slots.push(Arc::clone(&slot));
                state.handles.push(handle);
                slot
            }
        };

        state.leased += 1;
        debug!(
            target: "docsession::pool",
            worker = slot.index,
            session = %session.id(),
            "worker leased"
        );
        Ok(WorkerLease {
            slot,
            session: session.id(),
        })
    }

    /// Return a leased worker to the pool.
    ///
    /// Work already queued on the worker still runs; the next session to
    /// lease it is queued behind that work.
    pub fn release(&self, lease: WorkerLease) {
        let mut state = self.state.lock();
        state.leased = state.leased.saturating_sub(1);
        state.idle.push(lease.slot.index);
        debug!(
            target: "docsession::pool",
            worker = lease.slot.index,
            session = %lease.session,
            "worker released"
        );
    }

    /// Block until every queued and in-flight task has completed.
    ///
    /// Workers keep running afterwards.
    pub fn drain(&self) {
        let slots: Vec<Arc<WorkerSlot>> = self.state.lock().slots.clone();
        for slot in slots {
            slot.drain();
        }
    }

    /// Shut the pool down: refuse new leases, let workers finish their
    /// queues, then join them. Idempotent.
    pub fn shutdown(&self) {
        let handles = {
            let mut state = self.state.lock();
            state.shut_down = true;
            for slot in &state.slots {
                slot.signal_shutdown();
            }
            std::mem::take(&mut state.handles)
        };

        let current = std::thread::current().id();
        for handle in handles {
            // A worker cannot join itself
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    /// Return a snapshot of pool metrics.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            worker_count: state.slots.len(),
            leased: state.leased,
            idle: state.idle.len(),
            queue_depth: state
                .slots
                .iter()
                .map(|s| s.queue_depth.load(Ordering::Relaxed))
                .sum(),
            tasks_completed: state
                .slots
                .iter()
                .map(|s| s.tasks_completed.load(Ordering::Relaxed))
                .sum(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// RAII guard that clears `active` and notifies drain waiters on drop, even
/// if the task panics.
struct ActiveTaskGuard<'a> {
    slot: &'a WorkerSlot,
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::Release);
        self.slot.tasks_completed.fetch_add(1, Ordering::Relaxed);

        // Lock before notifying: drain() holds this lock while checking its
        // condition, so the wakeup cannot be lost.
        if self.slot.queue_depth.load(Ordering::Acquire) == 0 {
            let _queue = self.slot.queue.lock();
            self.slot.drain_cond.notify_all();
        }
    }
}

fn worker_loop(slot: &WorkerSlot) {
    let _ = slot.thread.set(std::thread::current().id());
    loop {
        let task = {
            let mut queue = slot.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    slot.queue_depth.fetch_sub(1, Ordering::Release);
                    slot.active.store(true, Ordering::Release);
                    break task;
                }
                if slot.shutdown.load(Ordering::Acquire) {
                    return;
                }
                slot.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveTaskGuard { slot };

        // Jobs are wrapped by the session dispatcher, which already contains
        // their failures. This only keeps the thread alive if that wrapper
        // itself panics.
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task.run())) {
            error!(
                target: "docsession::pool",
                worker = slot.index,
                "session task panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }
    }
}
