//! Device registry backed by the `devices` table.
//!
//! Credential resolution matches the exact `(uuid, token)` pair in one
//! query, so a wrong token for a known device and an unknown device are
//! indistinguishable to the caller.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use hydrolink_core::{DeviceRecord, DeviceRegistry, DeviceUuid, StoreError};

use crate::connection::ConnectionPool;
use crate::{db_err, join_err};

/// `SQLite` implementation of [`DeviceRegistry`].
#[derive(Clone)]
pub struct SqliteDeviceRegistry {
    pool: ConnectionPool,
}

impl SqliteDeviceRegistry {
    /// Wrap an existing connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Insert a new device row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on constraint violations (duplicate
    /// uuid or token) or any other database failure.
    pub async fn create(&self, record: &DeviceRecord, token: &str) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let record = record.clone();
        let token = token.to_owned();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(db_err)?;
            let _ = conn
                .execute(
                    "INSERT INTO devices (uuid, name, token, owner_id) VALUES (?1, ?2, ?3, ?4)",
                    params![record.uuid.to_string(), record.name, token, record.owner_id],
                )
                .map_err(db_err)?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_record((uuid, name, owner_id): (String, String, String)) -> Result<DeviceRecord, StoreError> {
    let uuid = uuid
        .parse::<DeviceUuid>()
        .map_err(|e| StoreError::Serialization(format!("bad device uuid in row: {e}")))?;
    Ok(DeviceRecord {
        uuid,
        name,
        owner_id,
    })
}

#[async_trait]
impl DeviceRegistry for SqliteDeviceRegistry {
    async fn find_by_credential(
        &self,
        uuid: &DeviceUuid,
        token: &str,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        let pool = self.pool.clone();
        let uuid = uuid.to_string();
        let token = token.to_owned();
        let row = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(db_err)?;
            conn.query_row(
                "SELECT uuid, name, owner_id FROM devices WHERE uuid = ?1 AND token = ?2",
                params![uuid, token],
                row_to_record,
            )
            .optional()
            .map_err(db_err)
        })
        .await
        .map_err(join_err)??;

        row.map(into_record).transpose()
    }

    async fn find_by_id(&self, uuid: &DeviceUuid) -> Result<Option<DeviceRecord>, StoreError> {
        let pool = self.pool.clone();
        let uuid = uuid.to_string();
        let row = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(db_err)?;
            conn.query_row(
                "SELECT uuid, name, owner_id FROM devices WHERE uuid = ?1",
                params![uuid],
                row_to_record,
            )
            .optional()
            .map_err(db_err)
        })
        .await
        .map_err(join_err)??;

        row.map(into_record).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
