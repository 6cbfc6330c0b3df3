//! Concrete jobs, organized by operation category.
//!
//! | Module | Jobs | Runs in |
//! |--------|------|---------|
//! | `cursor` | query, read, read all, count, close | session scope |
//! | `database` | list databases, pause, release session | session scope |
//! | `transaction` | commit, rollback, close connection | transaction |
//! | `write` | insert, delete | transaction |
//! | `index` | create, drop, list | transaction |
//!
//! Session-scope jobs implement [`Job`](crate::job::Job) directly.
//! Transaction jobs implement
//! [`TransactionalAction`](crate::job::TransactionalAction) and are wrapped in
//! a [`TransactionalJob`](crate::job::TransactionalJob) on submission.

pub(crate) mod cursor;
pub(crate) mod database;
pub(crate) mod index;
pub(crate) mod transaction;
pub(crate) mod write;
