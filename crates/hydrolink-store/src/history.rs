//! Telemetry history backed by the `telemetry` table.
//!
//! Appends are a single insert; recent-history queries order by
//! `recorded_at` then `rowid` so two readings stamped in the same
//! millisecond still come back insertion-ordered.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use uuid::Uuid;

use hydrolink_core::{DeviceUuid, HistoryStore, NewTelemetryRecord, StoreError, TelemetryRecord};

use crate::connection::ConnectionPool;
use crate::{db_err, join_err};

/// `SQLite` implementation of [`HistoryStore`].
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: ConnectionPool,
}

impl SqliteHistoryStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        device_uuid: row.get(1)?,
        kind: row.get(2)?,
        value: row.get(3)?,
        valve: row.get(4)?,
        recorded_at: row.get(5)?,
    })
}

struct RawRow {
    id: String,
    device_uuid: String,
    kind: String,
    value: String,
    valve: Option<i64>,
    recorded_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<TelemetryRecord, StoreError> {
        let device_uuid = self
            .device_uuid
            .parse::<DeviceUuid>()
            .map_err(|e| StoreError::Serialization(format!("bad device uuid in row: {e}")))?;
        let recorded_at = DateTime::parse_from_rfc3339(&self.recorded_at)
            .map_err(|e| StoreError::Serialization(format!("bad timestamp in row: {e}")))?
            .with_timezone(&Utc);
        Ok(TelemetryRecord {
            id: self.id,
            device_uuid,
            kind: self.kind,
            value: self.value,
            valve: self.valve,
            recorded_at,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, record: NewTelemetryRecord) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(db_err)?;
            let id = Uuid::now_v7().to_string();
            let recorded_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let _ = conn
                .execute(
                    "INSERT INTO telemetry (id, device_uuid, type, value, valve, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id,
                        record.device_uuid.to_string(),
                        record.data.kind,
                        record.data.value,
                        record.data.valve,
                        recorded_at
                    ],
                )
                .map_err(db_err)?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn recent(
        &self,
        uuid: &DeviceUuid,
        limit: usize,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        let pool = self.pool.clone();
        let uuid = uuid.to_string();
        let rows = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(db_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, device_uuid, type, value, valve, recorded_at
                     FROM telemetry
                     WHERE device_uuid = ?1
                     ORDER BY recorded_at DESC, rowid DESC
                     LIMIT ?2",
                )
                .map_err(db_err)?;
            let rows: Vec<RawRow> = stmt
                .query_map(
                    params![uuid, i64::try_from(limit).unwrap_or(i64::MAX)],
                    row_to_record,
                )
                .map_err(db_err)?
                .collect::<rusqlite::Result<_>>()
                .map_err(db_err)?;
            Ok::<_, StoreError>(rows)
        })
        .await
        .map_err(join_err)??;

        rows.into_iter().map(RawRow::into_record).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{StoreConfig, open_memory};
    use crate::devices::SqliteDeviceRegistry;
    use crate::migrations::run_migrations;
    use hydrolink_core::{DeviceRecord, TelemetryData};

    const TANK: &str = "11111111-1111-4111-8111-111111111111";

    async fn store_with_device() -> SqliteHistoryStore {
        let pool = open_memory(&StoreConfig::default()).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        let registry = SqliteDeviceRegistry::new(pool.clone());
        registry
            .create(
                &DeviceRecord {
                    uuid: TANK.parse().unwrap(),
                    name: "Main tank".to_owned(),
                    owner_id: "owner-1".to_owned(),
                },
                "abc",
            )
            .await
            .unwrap();
        SqliteHistoryStore::new(pool)
    }

    fn reading(kind: &str, value: &str) -> NewTelemetryRecord {
        NewTelemetryRecord {
            device_uuid: TANK.parse().unwrap(),
            data: TelemetryData {
                kind: kind.to_owned(),
                value: value.to_owned(),
                valve: None,
            },
        }
    }

    #[tokio::test]
    async fn append_then_recent_round_trips() {
        let store = store_with_device().await;
        store.append(reading("Level", "42")).await.unwrap();

        let records = store.recent(&TANK.parse().unwrap(), 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "Level");
        assert_eq!(records[0].value, "42");
        assert_eq!(records[0].valve, None);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let store = store_with_device().await;
        for i in 0..15 {
            store.append(reading("Level", &i.to_string())).await.unwrap();
        }

        let records = store.recent(&TANK.parse().unwrap(), 10).await.unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].value, "14");
        assert_eq!(records[9].value, "5");
    }

    #[tokio::test]
    async fn recent_for_device_with_no_history_is_empty() {
        let store = store_with_device().await;
        let records = store.recent(&TANK.parse().unwrap(), 10).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn valve_index_survives_the_round_trip() {
        let store = store_with_device().await;
        let mut record = reading("Valve", "open");
        record.data.valve = Some(2);
        store.append(record).await.unwrap();

        let records = store.recent(&TANK.parse().unwrap(), 10).await.unwrap();
        assert_eq!(records[0].valve, Some(2));
    }

    #[tokio::test]
    async fn append_for_unknown_device_fails_foreign_key() {
        let pool = open_memory(&StoreConfig::default()).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        let store = SqliteHistoryStore::new(pool);

        let err = store.append(reading("Level", "1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
