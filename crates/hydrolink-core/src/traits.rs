//! Collaborator contracts consumed by the broker.
//!
//! The device registry, history store, and identity verifier live outside
//! the broker (CRUD backend, persistence layer, auth provider). The broker
//! only ever sees them through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, StoreError};
use crate::ids::{DeviceUuid, SubjectId};
use crate::protocol::TelemetryData;

/// A registered device as resolved by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Device identifier.
    pub uuid: DeviceUuid,
    /// Human-readable device name.
    pub name: String,
    /// Owning user's uuid.
    pub owner_id: String,
}

/// A persisted telemetry row, read back for history replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Row identifier.
    pub id: String,
    /// The device that published the reading.
    pub device_uuid: DeviceUuid,
    /// Reading kind (e.g. `"Level"`, `"Valve"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Reading value.
    pub value: String,
    /// Valve index, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valve: Option<i64>,
    /// When the reading was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// A telemetry reading about to be persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTelemetryRecord {
    /// The publishing device.
    pub device_uuid: DeviceUuid,
    /// The reading.
    pub data: TelemetryData,
}

/// Resolves device credentials and identifiers to registry records.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Resolve the exact `(uuid, token)` pair. `None` when either half
    /// doesn't match.
    async fn find_by_credential(
        &self,
        uuid: &DeviceUuid,
        token: &str,
    ) -> Result<Option<DeviceRecord>, StoreError>;

    /// Resolve a device by identifier alone.
    async fn find_by_id(&self, uuid: &DeviceUuid) -> Result<Option<DeviceRecord>, StoreError>;
}

/// Appends telemetry and serves recent-history queries.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist one telemetry reading.
    async fn append(&self, record: NewTelemetryRecord) -> Result<(), StoreError>;

    /// Up to `limit` most recent records for a device, newest first.
    async fn recent(
        &self,
        uuid: &DeviceUuid,
        limit: usize,
    ) -> Result<Vec<TelemetryRecord>, StoreError>;
}

/// Validates a bearer credential and returns the verified subject.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token`, returning the subject's identity on success.
    async fn verify(&self, token: &str) -> Result<SubjectId, AuthError>;
}
