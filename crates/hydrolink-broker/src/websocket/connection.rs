//! WebSocket connection state and the outbound forward task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use hydrolink_core::ConnectionId;

/// One live WebSocket connection, device or dashboard.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the connection's outbound forward task.
    tx: mpsc::Sender<String>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Cleared when the transport closes; checked before fan-out sends.
    open: AtomicBool,
    /// When the last pong (or any inbound frame) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to a full or closed channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection with a fresh ID.
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            tx,
            connected_at: now,
            open: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a text message for the outbound forward task.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: String) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a value and queue it.
    pub fn send_json<T: serde::Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(json),
            Err(_) => false,
        }
    }

    /// Whether the transport is still open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    /// Mark the transport closed. Further fan-out skips this connection.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    /// Record a pong (or equivalent liveness signal).
    pub fn mark_alive(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}

/// Keepalive timing for the outbound forward task.
#[derive(Clone, Copy, Debug)]
pub struct Keepalive {
    /// Interval between pings.
    pub interval: Duration,
    /// Close the connection after this long without a pong.
    pub timeout: Duration,
}

/// Drain the per-connection channel into the WebSocket sink.
///
/// Sends periodic pings and closes the connection when the peer stops
/// answering them. Ends when `cancel` fires (session teardown or server
/// shutdown), when a sink write fails, or on keepalive timeout.
pub async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    conn: Arc<ClientConnection>,
    keepalive: Keepalive,
    cancel: CancellationToken,
) {
    let mut ping_interval = tokio::time::interval(keepalive.interval);
    let _ = ping_interval.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            msg = rx.recv() => {
                match msg {
                    Some(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_interval.tick() => {
                if conn.last_pong_elapsed() > keepalive.timeout {
                    debug!(conn_id = %conn.id, "keepalive timeout, closing connection");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
                trace!(conn_id = %conn.id, "sent ping");
            }
        }
    }

    conn.mark_closed();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        (ClientConnection::new(tx), rx)
    }

    #[test]
    fn new_connection_is_open_with_fresh_id() {
        let (conn, _rx) = make_connection();
        assert!(conn.is_open());
        assert!(conn.id.as_str().starts_with("conn_"));
        assert_eq!(conn.drop_count(), 0);
    }

    #[tokio::test]
    async fn send_queues_message() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send("hello".into()));
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn send_to_closed_channel_counts_drop() {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(tx);
        drop(rx);
        assert!(!conn.send("hello".into()));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_to_full_channel_counts_drop() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(tx);
        assert!(conn.send("msg1".into()));
        assert!(!conn.send("msg2".into()));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_json_serializes() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send_json(&serde_json::json!({"key": "value"})));
        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn mark_closed_flips_open_flag() {
        let (conn, _rx) = make_connection();
        conn.mark_closed();
        assert!(!conn.is_open());
    }

    #[test]
    fn mark_alive_resets_pong_clock() {
        let (conn, _rx) = make_connection();
        std::thread::sleep(Duration::from_millis(10));
        let before = conn.last_pong_elapsed();
        conn.mark_alive();
        assert!(conn.last_pong_elapsed() < before);
    }

    #[test]
    fn connection_ids_are_unique() {
        let (a, _rx_a) = make_connection();
        let (b, _rx_b) = make_connection();
        assert_ne!(a.id, b.id);
    }
}
