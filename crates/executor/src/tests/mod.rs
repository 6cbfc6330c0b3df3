//! Test modules for the executor crate.

pub mod support;


use std::sync::Arc;

use crate::{ExecutorConfig, ExecutorFactory, NoopReportFactory, Session, SessionExecutor, TickCounter};
use support::{MemoryStore, MemoryWrapper};

/// A factory over a fresh in-memory store, with a tick counter the test
/// controls.
pub(crate) struct Harness {
    pub wrapper: Arc<MemoryWrapper>,
    pub ticks: Arc<TickCounter>,
    pub factory: ExecutorFactory,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let wrapper = Arc::new(MemoryWrapper::new());
        let ticks = Arc::new(TickCounter::new());
        let factory = ExecutorFactory::builder(wrapper.clone())
            .config(config)
            .tick_monitor(ticks.clone())
            .report_factory(Arc::new(NoopReportFactory))
            .build()
            .unwrap();
        Self {
            wrapper,
            ticks,
            factory,
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        self.wrapper.store()
    }

    pub fn open(&self) -> SessionExecutor {
        self.factory.open_session(Session::new()).unwrap()
    }

    /// Spin until `n` workers are parked on the tick counter.
    pub fn wait_for_paused(&self, n: usize) {
        while self.ticks.waiters() < n {
            std::thread::yield_now();
        }
    }
}
