//! Fan-out to dashboard subscribers.

use serde::Serialize;
use tracing::{debug, warn};

use hydrolink_core::DeviceUuid;

use super::registry::Broker;

impl Broker {
    /// Deliver a message to every subscriber of `uuid`: the device's
    /// specific set plus all global subscribers.
    ///
    /// The payload is serialized once and handed to each connection's
    /// outbound queue. Closed transports are skipped; a full or closed
    /// queue is logged and skipped. At-most-once, no retries.
    pub async fn broadcast<T: Serialize>(&self, uuid: &DeviceUuid, payload: &T) {
        let json = match serde_json::to_string(payload) {
            Ok(j) => j,
            Err(e) => {
                warn!(device = %uuid, error = %e, "failed to serialize broadcast payload");
                return;
            }
        };
        self.broadcast_raw(uuid, &json).await;
    }

    /// Deliver an already-serialized message to every subscriber of `uuid`.
    pub async fn broadcast_raw(&self, uuid: &DeviceUuid, json: &str) {
        let subscribers = self.subscribers_for(uuid).await;
        debug!(
            device = %uuid,
            recipients = subscribers.len(),
            "broadcast to subscribers"
        );
        for conn in subscribers {
            if !conn.is_open() {
                continue;
            }
            if !conn.send(json.to_owned()) {
                warn!(conn_id = %conn.id, device = %uuid, "failed to deliver to subscriber");
            }
        }
    }
}
