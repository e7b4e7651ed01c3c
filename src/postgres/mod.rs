//! PostgreSQL persistence module.
//!
//! Provides the connection pool used by the PostgreSQL queue store.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
