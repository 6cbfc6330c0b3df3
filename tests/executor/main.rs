//! Executor Integration Tests
//!
//! End-to-end tests through the public `docsession` API:
//! - Multi-session workloads over one shared worker pool
//! - Transactions interleaved with queries on the same session
//! - Configuration files driving the factory
//! - Awaiting job handles from async code

mod common;

mod configuration;
mod multi_session;
mod session_workflow;
