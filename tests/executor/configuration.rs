//! Configuration Tests
//!
//! A server keeps `docsession.toml` in its data directory and builds its
//! factory from it.

use crate::common::*;
use docsession::{Error, ExecutorConfig, ExecutorFactory, Session, CONFIG_FILE_NAME};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn factory_from_default_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    ExecutorConfig::write_default_if_missing(&path).unwrap();

    let config = ExecutorConfig::from_file(&path).unwrap();
    let factory = ExecutorFactory::builder(Arc::new(SharedWrapper(SharedBackend::new())))
        .config(config)
        .build()
        .unwrap();
    assert_eq!(factory.config().pool.max_workers, 16);

    let executor = factory.open_session(Session::new()).unwrap();
    assert!(executor.get_databases().wait().is_ok());
}

#[test]
fn edited_config_file_takes_effect() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "database_name = \"catalog\"\n\n[pool]\nmax_workers = 1\n",
    )
    .unwrap();

    let server = create_server_with(ExecutorConfig::from_file(&path).unwrap());
    let executor = server.factory.open_session(Session::new()).unwrap();
    assert_eq!(executor.get_databases().wait().unwrap()[0].name, "catalog");
    assert!(server.factory.open_session(Session::new()).is_err());
}

#[test]
fn invalid_config_is_rejected_by_builder() {
    let mut config = ExecutorConfig::default();
    config.pool.queue_capacity = 0;
    let result = ExecutorFactory::builder(Arc::new(SharedWrapper(SharedBackend::new())))
        .config(config)
        .build();
    assert!(matches!(result, Err(Error::IllegalArgument { .. })));
}
