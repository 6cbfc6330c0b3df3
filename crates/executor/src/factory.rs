//! Executor factory.
//!
//! Wires the shared collaborators together once and opens a
//! [`SessionExecutor`] per client session.

use std::sync::Arc;

use docsession_core::{DbWrapper, Result, Session};
use tracing::debug;

use crate::config::ExecutorConfig;
use crate::dispatch::SessionDispatcher;
use crate::exception::{DefaultExceptionHandler, ExceptionHandler};
use crate::executor::SessionExecutor;
use crate::pool::{PoolStats, WorkerPool};
use crate::report::{ReportFactory, TracingReportFactory};
use crate::tick::{TickCounter, TickMonitor};

/// Opens session executors over one storage backend and one worker pool.
///
/// # Example
///
/// ```ignore
/// use docsession::{ExecutorConfig, ExecutorFactory, Session};
///
/// let factory = ExecutorFactory::builder(wrapper)
///     .config(ExecutorConfig::from_file(&path)?)
///     .build()?;
/// let executor = factory.open_session(Session::with_label("client-7"))?;
/// ```
pub struct ExecutorFactory {
    wrapper: Arc<dyn DbWrapper>,
    pool: Arc<WorkerPool>,
    monitor: Arc<dyn TickMonitor>,
    handler: Arc<dyn ExceptionHandler>,
    reports: Arc<dyn ReportFactory>,
    config: ExecutorConfig,
}

impl ExecutorFactory {
    /// Factory with default collaborators and configuration
    pub fn new(wrapper: Arc<dyn DbWrapper>) -> Result<Self> {
        Self::builder(wrapper).build()
    }

    /// Start configuring a factory
    pub fn builder(wrapper: Arc<dyn DbWrapper>) -> ExecutorFactoryBuilder {
        ExecutorFactoryBuilder {
            wrapper,
            config: ExecutorConfig::default(),
            monitor: None,
            handler: None,
            reports: None,
        }
    }

    /// Lease a worker to `session` and return its executor.
    ///
    /// # Errors
    ///
    /// Returns `TaskExecution` if every worker is leased or the pool is shut
    /// down. No connection is acquired here.
    pub fn open_session(&self, session: Session) -> Result<SessionExecutor> {
        let dispatcher = SessionDispatcher::new(
            session,
            Arc::clone(&self.pool),
            Arc::clone(&self.handler),
            Arc::clone(&self.reports),
        )?;
        debug!(
            target: "docsession::executor",
            session = %dispatcher.session(),
            "session opened"
        );
        Ok(SessionExecutor::new(
            dispatcher,
            Arc::clone(&self.wrapper),
            Arc::clone(&self.monitor),
            self.config.database_name.clone(),
            self.config.cursor.read_all_batch_size,
        ))
    }

    /// The shared worker pool
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Worker pool metrics
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The tick monitor `pause_until` jobs wait on
    pub fn tick_monitor(&self) -> &Arc<dyn TickMonitor> {
        &self.monitor
    }

    /// Active configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Let every queued job finish, then stop the worker threads.
    /// Idempotent. Sessions still open afterwards refuse submissions.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for ExecutorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorFactory")
            .field("config", &self.config)
            .field("pool", &self.pool.stats())
            .finish()
    }
}

/// Builder for [`ExecutorFactory`].
pub struct ExecutorFactoryBuilder {
    wrapper: Arc<dyn DbWrapper>,
    config: ExecutorConfig,
    monitor: Option<Arc<dyn TickMonitor>>,
    handler: Option<Arc<dyn ExceptionHandler>>,
    reports: Option<Arc<dyn ReportFactory>>,
}

impl ExecutorFactoryBuilder {
    /// Use `config` instead of the defaults
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Tick monitor for `pause_until` (default: a fresh [`TickCounter`])
    pub fn tick_monitor(mut self, monitor: Arc<dyn TickMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Exception handler (default: [`DefaultExceptionHandler`])
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Report factory (default: [`TracingReportFactory`])
    pub fn report_factory(mut self, reports: Arc<dyn ReportFactory>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Validate the configuration and create the worker pool.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if the configuration is invalid.
    pub fn build(self) -> Result<ExecutorFactory> {
        self.config.validate()?;
        Ok(ExecutorFactory {
            wrapper: self.wrapper,
            pool: Arc::new(WorkerPool::new(self.config.pool.clone())),
            monitor: self
                .monitor
                .unwrap_or_else(|| Arc::new(TickCounter::new())),
            handler: self
                .handler
                .unwrap_or_else(|| Arc::new(DefaultExceptionHandler)),
            reports: self
                .reports
                .unwrap_or_else(|| Arc::new(TracingReportFactory)),
            config: self.config,
        })
    }
}
