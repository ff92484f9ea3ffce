//! Branded ID newtypes for type safety.
//!
//! Device identifiers are validated strict UUID v4 — anything else is
//! rejected at the edge, before any registry lookup. Connection and message
//! IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error produced when a device identifier is not a strict UUID v4.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid device uuid: {0}")]
pub struct InvalidDeviceUuid(pub String);

/// Identifier of a registered device.
///
/// Only strict UUID v4 values parse; v1/v7/nil or malformed strings are
/// rejected so route handlers never see an unvalidated identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceUuid(Uuid);

impl DeviceUuid {
    /// Parse a strict UUID v4 device identifier.
    pub fn parse(s: &str) -> Result<Self, InvalidDeviceUuid> {
        let uuid = Uuid::parse_str(s).map_err(|_| InvalidDeviceUuid(s.to_owned()))?;
        if uuid.get_version() != Some(uuid::Version::Random) {
            return Err(InvalidDeviceUuid(s.to_owned()));
        }
        Ok(Self(uuid))
    }

    /// Generate a fresh random device identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying [`Uuid`].
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DeviceUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for DeviceUuid {
    type Err = InvalidDeviceUuid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for DeviceUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Subscription target parsed from the dashboard path segment.
///
/// Either a strict v4 device identifier or the literal wildcard `all`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeTarget {
    /// Subscribe to one device's channel.
    Device(DeviceUuid),
    /// Subscribe to every device (global channel).
    All,
}

impl SubscribeTarget {
    /// Parse a path segment into a target.
    pub fn parse(s: &str) -> Result<Self, InvalidDeviceUuid> {
        if s == "all" {
            return Ok(Self::All);
        }
        DeviceUuid::parse(s).map(Self::Device)
    }
}

impl fmt::Display for SubscribeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(uuid) => uuid.fmt(f),
            Self::All => f.write_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for SubscribeTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), new_v7()))
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id! {
    /// Unique identifier for one live WebSocket connection.
    ConnectionId, "conn"
}

branded_id! {
    /// Server-generated identifier stamped on acks and commands.
    MessageId, "msg"
}

branded_id! {
    /// Verified identity of a dashboard caller (the owner's user uuid).
    SubjectId, "sub"
}

impl SubjectId {
    /// Wrap a verified subject value without generating a new id.
    #[must_use]
    pub fn from_verified(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_uuid_accepts_strict_v4() {
        let id = DeviceUuid::parse("11111111-1111-4111-8111-111111111111").unwrap();
        assert_eq!(id.to_string(), "11111111-1111-4111-8111-111111111111");
    }

    #[test]
    fn device_uuid_rejects_v1() {
        // Version nibble is 1, not 4
        let err = DeviceUuid::parse("11111111-1111-1111-8111-111111111111");
        assert!(err.is_err());
    }

    #[test]
    fn device_uuid_rejects_v7() {
        let v7 = Uuid::now_v7().to_string();
        assert!(DeviceUuid::parse(&v7).is_err());
    }

    #[test]
    fn device_uuid_rejects_nil() {
        assert!(DeviceUuid::parse("00000000-0000-0000-0000-000000000000").is_err());
    }

    #[test]
    fn device_uuid_rejects_garbage() {
        assert!(DeviceUuid::parse("not-a-uuid").is_err());
        assert!(DeviceUuid::parse("").is_err());
        assert!(DeviceUuid::parse("11111111-1111-4111-8111").is_err());
    }

    #[test]
    fn device_uuid_new_is_v4() {
        let id = DeviceUuid::new();
        assert_eq!(id.as_uuid().get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn device_uuid_deserialize_validates() {
        let ok: Result<DeviceUuid, _> =
            serde_json::from_str("\"11111111-1111-4111-8111-111111111111\"");
        assert!(ok.is_ok());
        let bad: Result<DeviceUuid, _> =
            serde_json::from_str("\"11111111-1111-1111-8111-111111111111\"");
        assert!(bad.is_err());
    }

    #[test]
    fn device_uuid_serializes_as_plain_string() {
        let id = DeviceUuid::parse("11111111-1111-4111-8111-111111111111").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"11111111-1111-4111-8111-111111111111\"");
    }

    #[test]
    fn target_parses_wildcard() {
        assert_eq!(SubscribeTarget::parse("all").unwrap(), SubscribeTarget::All);
    }

    #[test]
    fn target_parses_device_uuid() {
        let target = SubscribeTarget::parse("11111111-1111-4111-8111-111111111111").unwrap();
        assert!(matches!(target, SubscribeTarget::Device(_)));
    }

    #[test]
    fn target_rejects_other_words() {
        assert!(SubscribeTarget::parse("everything").is_err());
        assert!(SubscribeTarget::parse("ALL").is_err());
    }

    #[test]
    fn connection_id_has_prefix() {
        let id = ConnectionId::new();
        assert!(id.as_str().starts_with("conn_"));
    }

    #[test]
    fn message_id_has_prefix_and_is_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert!(a.as_str().starts_with("msg_"));
        assert_ne!(a, b);
    }

    #[test]
    fn subject_id_from_verified_preserves_value() {
        let sub = SubjectId::from_verified("owner-uuid-1");
        assert_eq!(sub.as_str(), "owner-uuid-1");
    }

    #[test]
    fn branded_id_serde_is_transparent() {
        let id = ConnectionId::from("conn_fixed");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn_fixed\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
