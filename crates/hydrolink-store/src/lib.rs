//! `SQLite`-backed persistence for Hydrolink.
//!
//! Two stores share one connection pool: the device registry (credential
//! and identifier lookups against the `devices` table) and the telemetry
//! history store (append plus recent-history queries against `telemetry`).
//! Schema migrations are embedded and run at startup.
//!
//! All rusqlite work runs on the blocking thread pool via
//! [`tokio::task::spawn_blocking`]; the async trait impls in
//! [`devices`] and [`history`] never hold a pooled connection across an
//! await point.

pub mod connection;
pub mod devices;
pub mod history;
pub mod migrations;

pub use connection::{ConnectionPool, PooledConnection, StoreConfig, open_file, open_memory};
pub use devices::SqliteDeviceRegistry;
pub use history::SqliteHistoryStore;
pub use migrations::run_migrations;

use hydrolink_core::StoreError;

/// Map any database-layer failure into [`StoreError::Database`].
pub(crate) fn db_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Map a blocking-task join failure into [`StoreError::Database`].
pub(crate) fn join_err(e: tokio::task::JoinError) -> StoreError {
    StoreError::Database(format!("blocking task failed: {e}"))
}
