//! Wire-format types for the broker's WebSocket protocol.
//!
//! All JSON field names are camelCase to match the dashboard and firmware
//! clients. Envelope `event` / `type` discriminators and the 4000-range
//! close codes are part of the client contract and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{DeviceUuid, MessageId};
use crate::traits::{DeviceRecord, TelemetryRecord};

/// Application-level WebSocket close codes (4000-range, client-visible).
pub mod close_code {
    /// Credential did not resolve to a device or a verified identity.
    pub const UNAUTHORIZED: u16 = 4001;
    /// Verified identity does not own the requested device.
    pub const FORBIDDEN: u16 = 4003;
    /// Identifier was missing, malformed, or names an unknown device.
    pub const BAD_IDENTIFIER: u16 = 4004;
    /// Unexpected server-side failure.
    pub const INTERNAL: u16 = 4005;
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// One telemetry reading as published by a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryData {
    /// Reading kind (e.g. `"Level"`, `"Valve"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Reading value, stringly-typed by the firmware.
    pub value: String,
    /// Valve index, when the reading concerns a valve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valve: Option<i64>,
}

/// Inbound frame from a device connection: `{ data, save }`.
///
/// A frame that fails to parse — malformed JSON or missing `data` — is a
/// message-format error: the sender gets an [`ErrorAck`] and the connection
/// stays open.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFrame {
    /// The telemetry payload.
    pub data: TelemetryData,
    /// Whether the payload should be persisted before fan-out.
    #[serde(default)]
    pub save: bool,
}

/// Device identity echoed inside outbound envelopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    /// Device identifier.
    pub uuid: DeviceUuid,
    /// Human-readable device name.
    pub name: String,
}

impl From<&DeviceRecord> for DeviceRef {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            uuid: record.uuid,
            name: record.name.clone(),
        }
    }
}

/// Telemetry broadcast to subscribers: `{ event: "device_update", ... }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    /// Always `"device_update"`.
    pub event: String,
    /// Originating device.
    pub device: DeviceRef,
    /// The telemetry payload, forwarded unmodified.
    pub data: TelemetryData,
    /// Server receive time, RFC 3339.
    pub timestamp: String,
    /// Whether the publisher asked for persistence.
    pub save: bool,
}

impl DeviceUpdate {
    /// Build a broadcast envelope stamped with the current time.
    #[must_use]
    pub fn new(device: DeviceRef, data: TelemetryData, save: bool) -> Self {
        Self {
            event: "device_update".to_owned(),
            device,
            data,
            timestamp: now_rfc3339(),
            save,
        }
    }
}

/// Connection status of a device, as seen by subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatusKind {
    /// First live connection opened.
    Connected,
    /// Last live connection closed.
    Disconnected,
}

/// Status broadcast: `{ event: "device_status", ... }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Always `"device_status"`.
    pub event: String,
    /// The device whose status changed.
    pub device: DeviceRef,
    /// `connected` on the zero→one transition, `disconnected` on one→zero.
    pub status: DeviceStatusKind,
    /// Server time of the transition, RFC 3339.
    pub timestamp: String,
}

impl DeviceStatus {
    /// Build a status envelope stamped with the current time.
    #[must_use]
    pub fn new(device: DeviceRef, status: DeviceStatusKind) -> Self {
        Self {
            event: "device_status".to_owned(),
            device,
            status,
            timestamp: now_rfc3339(),
        }
    }
}

/// Acknowledgement sent to a dashboard after a successful subscribe.
///
/// For the global (wildcard) target the `device` field is omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionAck {
    /// Always `"subscription_ack"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Always `"subscribed"`.
    pub status: String,
    /// The subscribed device, absent for the global channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceRef>,
    /// Subscription time, RFC 3339.
    pub timestamp: String,
}

impl SubscriptionAck {
    /// Ack for a specific-device subscription.
    #[must_use]
    pub fn device(device: DeviceRef) -> Self {
        Self {
            kind: "subscription_ack".to_owned(),
            status: "subscribed".to_owned(),
            device: Some(device),
            timestamp: now_rfc3339(),
        }
    }

    /// Ack for the global (all-devices) subscription.
    #[must_use]
    pub fn global() -> Self {
        Self {
            kind: "subscription_ack".to_owned(),
            status: "subscribed".to_owned(),
            device: None,
            timestamp: now_rfc3339(),
        }
    }
}

/// One-shot recent-history snapshot for a freshly subscribed dashboard.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalData {
    /// Always `"historical_data"`.
    pub event: String,
    /// The subscribed device.
    pub device: DeviceRef,
    /// Up to the replay limit of records, most recent first.
    pub data: Vec<TelemetryRecord>,
    /// Snapshot time, RFC 3339.
    pub timestamp: String,
}

impl HistoricalData {
    /// Build a snapshot envelope stamped with the current time.
    #[must_use]
    pub fn new(device: DeviceRef, data: Vec<TelemetryRecord>) -> Self {
        Self {
            event: "historical_data".to_owned(),
            device,
            data,
            timestamp: now_rfc3339(),
        }
    }
}

/// Reply to the publishing device after each processed frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAck {
    /// Always `"OK"`.
    pub status: String,
    /// Server-generated id for this frame.
    pub message_id: MessageId,
    /// Echoes the frame's `save` flag.
    pub saved: bool,
}

impl DeviceAck {
    /// Build an OK ack with a fresh message id.
    #[must_use]
    pub fn ok(saved: bool) -> Self {
        Self {
            status: "OK".to_owned(),
            message_id: MessageId::new(),
            saved,
        }
    }
}

/// Reply to a device whose frame could not be parsed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorAck {
    /// Human-readable description of the format problem.
    pub error: String,
}

impl ErrorAck {
    /// Build an error ack.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// An operator command stamped with a server message id and timestamp.
#[derive(Clone, Debug)]
pub struct StampedCommand {
    /// Generated id shared by every delivery of this command.
    pub message_id: MessageId,
    /// The serialized wire payload.
    pub json: String,
}

/// Append `messageId` and `timestamp` to an operator payload.
///
/// Object payloads are augmented in place; anything else is wrapped under a
/// `payload` key first so the stamp always has somewhere to live.
#[must_use]
pub fn stamp_command(payload: Value) -> StampedCommand {
    let message_id = MessageId::new();
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            let _ = map.insert("payload".to_owned(), other);
            map
        }
    };
    let _ = map.insert(
        "messageId".to_owned(),
        Value::String(message_id.to_string()),
    );
    let _ = map.insert("timestamp".to_owned(), Value::String(now_rfc3339()));
    let json = Value::Object(map).to_string();
    StampedCommand { message_id, json }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
