//! Device session lifecycle: credential check, receive loop, status events.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use hydrolink_core::{
    DeviceAck, DeviceFrame, DeviceRecord, DeviceRef, DeviceStatus, DeviceStatusKind, DeviceUpdate,
    DeviceUuid, ErrorAck, NewTelemetryRecord, close_code,
};

use super::close_with;
use super::connection::{ClientConnection, Keepalive, forward_outbound};
use crate::server::AppState;

/// Run one device connection to completion.
///
/// Resolves the `(uuid, token)` pair first; a failed lookup closes the
/// socket with 4001 (no match) or 4005 (store failure) and leaves broker
/// state untouched. On success the connection joins the device's session,
/// frames are processed strictly in arrival order, and teardown broadcasts
/// the `disconnected` status when the last connection goes.
pub async fn run_device_session(
    socket: WebSocket,
    uuid: DeviceUuid,
    token: String,
    state: AppState,
) {
    let (mut sink, mut stream) = socket.split();

    let device = match state.devices.find_by_credential(&uuid, &token).await {
        Ok(Some(device)) => device,
        Ok(None) => {
            info!(device = %uuid, "device credential rejected");
            close_with(&mut sink, close_code::UNAUTHORIZED, "unauthorized").await;
            return;
        }
        Err(e) => {
            error!(device = %uuid, error = %e, "registry lookup failed");
            close_with(&mut sink, close_code::INTERNAL, "internal error").await;
            return;
        }
    };

    let (tx, rx) = mpsc::channel(state.config.send_queue_size);
    let conn = Arc::new(ClientConnection::new(tx));
    let keepalive = Keepalive {
        interval: Duration::from_secs(state.config.heartbeat_interval_secs),
        timeout: Duration::from_secs(state.config.heartbeat_timeout_secs),
    };
    let cancel = state.shutdown.token().child_token();
    let forwarder = tokio::spawn(forward_outbound(
        sink,
        rx,
        conn.clone(),
        keepalive,
        cancel.clone(),
    ));

    let first = state.broker.register_device(device.clone(), conn.clone()).await;
    info!(device = %uuid, conn_id = %conn.id, "device connected");
    if first {
        let status = DeviceStatus::new(DeviceRef::from(&device), DeviceStatusKind::Connected);
        state.broker.broadcast(&uuid, &status).await;
    }

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                conn.mark_alive();
                handle_frame(&state, &device, &conn, text.as_str()).await;
            }
            Message::Pong(_) => conn.mark_alive(),
            Message::Close(_) => break,
            // axum answers pings automatically
            _ => {}
        }
    }

    conn.mark_closed();
    let last = state.broker.unregister_device(&uuid, &conn.id).await;
    info!(device = %uuid, conn_id = %conn.id, dropped = conn.drop_count(), "device disconnected");
    if let Some(cached) = last {
        // Refresh the record for the status payload; the session's cached
        // copy covers a registry outage or a mid-session deregistration.
        let record = match state.devices.find_by_id(&uuid).await {
            Ok(Some(record)) => record,
            Ok(None) | Err(_) => cached,
        };
        let status = DeviceStatus::new(DeviceRef::from(&record), DeviceStatusKind::Disconnected);
        state.broker.broadcast(&uuid, &status).await;
    }

    cancel.cancel();
    let _ = forwarder.await;
}

/// Process one inbound text frame.
///
/// A malformed frame gets an error ack on the same connection and the
/// session stays open. A valid frame is persisted when `save` is set
/// (append failure is logged and never blocks fan-out), broadcast as a
/// `device_update`, then acked.
async fn handle_frame(
    state: &AppState,
    device: &DeviceRecord,
    conn: &ClientConnection,
    raw: &str,
) {
    let frame: DeviceFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(device = %device.uuid, error = %e, "malformed device frame");
            let _ = conn.send_json(&ErrorAck::new("invalid message format"));
            return;
        }
    };

    if frame.save {
        let record = NewTelemetryRecord {
            device_uuid: device.uuid,
            data: frame.data.clone(),
        };
        if let Err(e) = state.history.append(record).await {
            warn!(device = %device.uuid, error = %e, "telemetry append failed");
        }
    }

    let update = DeviceUpdate::new(DeviceRef::from(device), frame.data, frame.save);
    state.broker.broadcast(&device.uuid, &update).await;

    let _ = conn.send_json(&DeviceAck::ok(frame.save));
}
