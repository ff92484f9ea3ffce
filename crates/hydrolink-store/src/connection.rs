//! `SQLite` connection pool with WAL mode and foreign keys enabled.
//!
//! Uses `r2d2` pooling with the `r2d2_sqlite` backend. The
//! [`PragmaCustomizer`] runs on every new connection so WAL mode, the busy
//! timeout, and foreign keys are set before any statement executes.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use hydrolink_core::StoreError;

use crate::db_err;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool sizing and pragma configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum pool size (default: 16).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 30000).
    pub busy_timeout_ms: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            busy_timeout_ms: 30_000,
        }
    }
}

/// Pragma customizer that runs on each new connection.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA foreign_keys = ON;\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

fn build_pool(
    manager: SqliteConnectionManager,
    config: &StoreConfig,
) -> Result<ConnectionPool, StoreError> {
    Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(std::time::Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)
        .map_err(db_err)
}

/// Create a file-backed connection pool.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the pool cannot be built, e.g. the
/// database file is unopenable.
pub fn open_file(path: &str, config: &StoreConfig) -> Result<ConnectionPool, StoreError> {
    build_pool(SqliteConnectionManager::file(path), config)
}

/// Create an in-memory connection pool (for testing).
///
/// Uses a uniquely named shared-cache database so every pooled connection
/// sees the same schema and rows. The pool keeps idle connections open,
/// which keeps the database alive for the pool's lifetime.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the pool cannot be built.
pub fn open_memory(config: &StoreConfig) -> Result<ConnectionPool, StoreError> {
    use rusqlite::OpenFlags;

    let uri = format!(
        "file:hydrolink-{}?mode=memory&cache=shared",
        uuid::Uuid::now_v7()
    );
    let manager = SqliteConnectionManager::file(uri).with_flags(
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    );
    build_pool(manager, config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn pragma_state(conn: &Connection) -> (String, bool) {
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        let foreign_keys: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        (journal_mode, foreign_keys == 1)
    }

    #[test]
    fn memory_pool_creates_successfully() {
        let pool = open_memory(&StoreConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        let (journal_mode, foreign_keys) = pragma_state(&conn);
        assert!(
            journal_mode == "wal" || journal_mode == "memory",
            "journal_mode should be wal or memory, got: {journal_mode}"
        );
        assert!(foreign_keys);
    }

    #[test]
    fn file_pool_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = open_file(path.to_str().unwrap(), &StoreConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        let (journal_mode, foreign_keys) = pragma_state(&conn);
        assert_eq!(journal_mode, "wal");
        assert!(foreign_keys);
    }

    #[test]
    fn pool_honours_max_size() {
        let config = StoreConfig {
            pool_size: 2,
            ..Default::default()
        };
        let pool = open_memory(&config).unwrap();
        assert_eq!(pool.max_size(), 2);
    }
}
