//! WebSocket session handling, connection registry, and fan-out.

pub mod broadcast;
pub mod command;
pub mod connection;
pub mod dashboard;
pub mod device;
pub mod history;
pub mod registry;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;

/// Send an application close frame (4000-range) and ignore sink errors:
/// the peer may already be gone.
pub(crate) async fn close_with(sink: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
}
