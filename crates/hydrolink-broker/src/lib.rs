//! Real-time telemetry broker.
//!
//! Devices connect over `/ws/device/{uuid}` and publish telemetry frames;
//! dashboards connect over `/ws/dashboard/{target}` and receive live
//! updates for one device or for every device via the `all` wildcard.
//! The [`websocket::registry::Broker`] owns all connection state; fan-out
//! is fire-and-forget with per-subscriber failures logged and skipped.

pub mod config;
pub mod gateway;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::BrokerConfig;
pub use server::{AppState, BrokerServer, ServerHandle};
pub use shutdown::ShutdownCoordinator;
pub use websocket::command::{CommandDelivery, CommandReceipt};
pub use websocket::registry::Broker;
