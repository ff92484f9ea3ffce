//! Dashboard session lifecycle: bearer verification, subscription, replay.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info};

use hydrolink_core::{
    DeviceRecord, DeviceRef, ErrorAck, SubscribeTarget, SubscriptionAck, close_code,
};

use super::close_with;
use super::connection::{ClientConnection, Keepalive, forward_outbound};
use super::history;
use crate::server::AppState;

/// Run one dashboard connection to completion.
///
/// The bearer credential is verified first; failure closes with 4001 and
/// no subscription is recorded. A specific target must name a known device
/// owned by the verified subject (4004 / 4003 otherwise). The wildcard
/// target subscribes any verified identity. After the ack (and, for a
/// specific target, the history replay) the connection only listens;
/// inbound payload frames are ignored.
pub async fn run_dashboard_session(
    socket: WebSocket,
    target: SubscribeTarget,
    token: String,
    state: AppState,
) {
    let (mut sink, mut stream) = socket.split();

    let subject = match state.verifier.verify(&token).await {
        Ok(subject) => subject,
        Err(e) => {
            info!(target = %target, error = %e, "dashboard credential rejected");
            close_with(&mut sink, close_code::UNAUTHORIZED, "unauthorized").await;
            return;
        }
    };

    let device: Option<DeviceRecord> = match target {
        SubscribeTarget::Device(uuid) => match state.devices.find_by_id(&uuid).await {
            Ok(Some(device)) => {
                if device.owner_id != subject.as_str() {
                    info!(device = %uuid, subject = %subject, "subscription forbidden");
                    let _ = sink
                        .send(Message::Text(error_json("forbidden").into()))
                        .await;
                    close_with(&mut sink, close_code::FORBIDDEN, "forbidden").await;
                    return;
                }
                Some(device)
            }
            Ok(None) => {
                info!(device = %uuid, "subscription to unknown device");
                let _ = sink
                    .send(Message::Text(error_json("unknown device").into()))
                    .await;
                close_with(&mut sink, close_code::BAD_IDENTIFIER, "unknown device").await;
                return;
            }
            Err(e) => {
                error!(device = %uuid, error = %e, "registry lookup failed");
                close_with(&mut sink, close_code::INTERNAL, "internal error").await;
                return;
            }
        },
        SubscribeTarget::All => None,
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

    match &device {
        Some(device) => {
            state
                .broker
                .subscribe_device(device.uuid, conn.clone())
                .await;
            let _ = conn.send_json(&SubscriptionAck::device(DeviceRef::from(device)));
            history::replay(
                state.history.as_ref(),
                device,
                &conn,
                state.config.history_replay_limit,
            )
            .await;
        }
        None => {
            state.broker.subscribe_all(conn.clone()).await;
            let _ = conn.send_json(&SubscriptionAck::global());
        }
    }
    info!(conn_id = %conn.id, target = %target, subject = %subject, "dashboard subscribed");

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            // Dashboards only listen; any inbound frame counts as liveness.
            Message::Text(_) | Message::Pong(_) => conn.mark_alive(),
            Message::Close(_) => break,
            _ => {}
        }
    }

    conn.mark_closed();
    state.broker.unsubscribe(&target, &conn.id).await;
    info!(conn_id = %conn.id, target = %target, dropped = conn.drop_count(), "dashboard disconnected");

    cancel.cancel();
    let _ = forwarder.await;
}

fn error_json(message: &str) -> String {
    serde_json::to_string(&ErrorAck::new(message)).unwrap_or_else(|_| String::new())
}
