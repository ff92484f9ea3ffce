//! # hydrolink-core
//!
//! Foundation types for the Hydrolink telemetry broker.
//!
//! This crate provides the shared vocabulary that all other Hydrolink crates
//! depend on:
//!
//! - **Branded IDs**: [`DeviceUuid`] (strict UUID v4), [`ConnectionId`],
//!   [`MessageId`], [`SubjectId`] as newtypes for type safety
//! - **Wire protocol**: inbound device frames, outbound broadcast envelopes,
//!   acknowledgements, and the 4000-range application close codes
//! - **Collaborator contracts**: [`DeviceRegistry`], [`HistoryStore`],
//!   [`IdentityVerifier`] traits consumed by the broker
//! - **Errors**: [`BrokerError`] taxonomy plus [`StoreError`] / [`AuthError`]
//!   via `thiserror`

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod protocol;
pub mod traits;

pub use errors::{AuthError, BrokerError, StoreError};
pub use ids::{ConnectionId, DeviceUuid, MessageId, SubjectId, SubscribeTarget};
pub use protocol::{
    DeviceAck, DeviceFrame, DeviceRef, DeviceStatus, DeviceStatusKind, DeviceUpdate, ErrorAck,
    HistoricalData, SubscriptionAck, TelemetryData, close_code,
};
pub use traits::{
    DeviceRecord, DeviceRegistry, HistoryStore, IdentityVerifier, NewTelemetryRecord,
    TelemetryRecord,
};
