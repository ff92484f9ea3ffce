//! Recent-history replay for freshly subscribed dashboards.

use tracing::{debug, warn};

use hydrolink_core::{DeviceRecord, DeviceRef, HistoricalData, HistoryStore};

use super::connection::ClientConnection;

/// Send up to `limit` recent records to one newly subscribed connection.
///
/// One-shot: a single `historical_data` envelope, newest record first,
/// delivered only to `conn`. A device with no history gets nothing, and a
/// store failure is logged without touching the fresh subscription.
pub async fn replay(
    history: &dyn HistoryStore,
    device: &DeviceRecord,
    conn: &ClientConnection,
    limit: usize,
) {
    let records = match history.recent(&device.uuid, limit).await {
        Ok(records) => records,
        Err(e) => {
            warn!(device = %device.uuid, error = %e, "history lookup failed, skipping replay");
            return;
        }
    };
    if records.is_empty() {
        return;
    }

    debug!(device = %device.uuid, records = records.len(), "replaying history");
    let snapshot = HistoricalData::new(DeviceRef::from(device), records);
    if !conn.send_json(&snapshot) {
        warn!(conn_id = %conn.id, device = %device.uuid, "failed to deliver history snapshot");
    }
}
