//! Command delivery from operators to device connections.

use serde_json::Value;
use tracing::{info, warn};

use hydrolink_core::{BrokerError, ConnectionId, DeviceUuid, MessageId, protocol};

use super::registry::Broker;

/// Outcome of one delivery attempt.
#[derive(Clone, Debug)]
pub struct CommandDelivery {
    /// The device connection the command was offered to.
    pub connection_id: ConnectionId,
    /// Whether the command reached the connection's outbound queue.
    pub delivered: bool,
}

/// Result of a command send: one message id shared by every delivery.
#[derive(Clone, Debug)]
pub struct CommandReceipt {
    /// Server-generated id stamped into the payload.
    pub message_id: MessageId,
    /// Per-connection delivery outcomes.
    pub deliveries: Vec<CommandDelivery>,
}

impl Broker {
    /// Send an operator command to every live connection of one device.
    ///
    /// The payload is stamped with a single `messageId` and `timestamp`
    /// and offered to each connection. Commands are not persisted and no
    /// reply is correlated; delivery is at-most-once per connection.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotConnected`] when the device has no live
    /// connections. Nothing is sent in that case.
    pub async fn send_command(
        &self,
        uuid: &DeviceUuid,
        payload: Value,
    ) -> Result<CommandReceipt, BrokerError> {
        let connections = self.device_connections(uuid).await;
        if connections.is_empty() {
            return Err(BrokerError::NotConnected(uuid.to_string()));
        }

        let stamped = protocol::stamp_command(payload);
        let mut deliveries = Vec::with_capacity(connections.len());
        for conn in connections {
            let delivered = conn.is_open() && conn.send(stamped.json.clone());
            if !delivered {
                warn!(conn_id = %conn.id, device = %uuid, "command delivery failed");
            }
            deliveries.push(CommandDelivery {
                connection_id: conn.id.clone(),
                delivered,
            });
        }

        info!(
            device = %uuid,
            message_id = %stamped.message_id,
            deliveries = deliveries.len(),
            "command dispatched"
        );
        Ok(CommandReceipt {
            message_id: stamped.message_id,
            deliveries,
        })
    }
}
