//! The broker's connection state: device sessions and subscriber sets.
//!
//! All three maps live behind this type and nothing else mutates them.
//! Device sessions are created lazily on the first connection and deleted
//! when the last one goes; the same lazy/eager rule applies to the
//! per-device subscriber sets. The global set holds wildcard dashboards.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use hydrolink_core::{ConnectionId, DeviceRecord, DeviceUuid, SubscribeTarget};

use super::connection::ClientConnection;

/// One device's live connections plus its cached registry record.
pub struct DeviceSession {
    /// Registry record captured at connect time. Used as the status
    /// payload fallback when the registry is unreachable at disconnect.
    pub device: DeviceRecord,
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
}

/// Owns every piece of live connection state.
pub struct Broker {
    sessions: RwLock<HashMap<DeviceUuid, DeviceSession>>,
    subscriptions: RwLock<HashMap<DeviceUuid, HashMap<ConnectionId, Arc<ClientConnection>>>>,
    global: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl Broker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            global: RwLock::new(HashMap::new()),
        }
    }

    /// Add a device connection, creating the session if absent.
    ///
    /// Returns `true` on the zero-to-one transition, i.e. when this is the
    /// device's first live connection.
    pub async fn register_device(
        &self,
        device: DeviceRecord,
        conn: Arc<ClientConnection>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(device.uuid).or_insert_with(|| DeviceSession {
            device,
            connections: HashMap::new(),
        });
        let was_empty = session.connections.is_empty();
        let _ = session.connections.insert(conn.id.clone(), conn);
        was_empty
    }

    /// Remove a device connection, deleting the session when it empties.
    ///
    /// Returns the cached registry record on the one-to-zero transition
    /// (the caller broadcasts the `disconnected` status), `None` otherwise.
    pub async fn unregister_device(
        &self,
        uuid: &DeviceUuid,
        id: &ConnectionId,
    ) -> Option<DeviceRecord> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(uuid)?;
        let _ = session.connections.remove(id);
        if session.connections.is_empty() {
            sessions.remove(uuid).map(|s| s.device)
        } else {
            None
        }
    }

    /// Add a dashboard connection to one device's subscriber set.
    pub async fn subscribe_device(&self, uuid: DeviceUuid, conn: Arc<ClientConnection>) {
        let mut subs = self.subscriptions.write().await;
        let _ = subs.entry(uuid).or_default().insert(conn.id.clone(), conn);
    }

    /// Add a dashboard connection to the global (all-devices) set.
    pub async fn subscribe_all(&self, conn: Arc<ClientConnection>) {
        let mut global = self.global.write().await;
        let _ = global.insert(conn.id.clone(), conn);
    }

    /// Remove a dashboard connection from its subscriber set.
    ///
    /// Specific sets are deleted when they empty; the global set persists.
    pub async fn unsubscribe(&self, target: &SubscribeTarget, id: &ConnectionId) {
        match target {
            SubscribeTarget::Device(uuid) => {
                let mut subs = self.subscriptions.write().await;
                if let Some(set) = subs.get_mut(uuid) {
                    let _ = set.remove(id);
                    if set.is_empty() {
                        let _ = subs.remove(uuid);
                    }
                }
            }
            SubscribeTarget::All => {
                let mut global = self.global.write().await;
                let _ = global.remove(id);
            }
        }
    }

    /// Open connections for one device, for command delivery.
    pub async fn device_connections(&self, uuid: &DeviceUuid) -> Vec<Arc<ClientConnection>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(uuid)
            .map(|s| s.connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Devices with at least one live connection.
    pub async fn device_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Total live device connections across all sessions.
    pub async fn device_connection_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().map(|s| s.connections.len()).sum()
    }

    /// Dashboard subscribers, specific sets plus the global set.
    pub async fn subscriber_count(&self) -> usize {
        let specific: usize = {
            let subs = self.subscriptions.read().await;
            subs.values().map(HashMap::len).sum()
        };
        specific + self.global.read().await.len()
    }

    /// Subscribers that should receive messages about `uuid`: the device's
    /// specific set plus every global subscriber.
    pub(crate) async fn subscribers_for(&self, uuid: &DeviceUuid) -> Vec<Arc<ClientConnection>> {
        let mut out = Vec::new();
        {
            let subs = self.subscriptions.read().await;
            if let Some(set) = subs.get(uuid) {
                out.extend(set.values().cloned());
            }
        }
        {
            let global = self.global.read().await;
            out.extend(global.values().cloned());
        }
        out
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
