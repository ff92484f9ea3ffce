//! Shutdown signalling for the server and its connection tasks.
//!
//! A single [`ShutdownCoordinator`] is shared by [`crate::server::BrokerServer`]:
//! the accept loop hands `token().cancelled()` to axum's graceful shutdown,
//! and each session forwarder runs under a `child_token()` of the same token,
//! so one `shutdown()` call drains the listener and every open socket.

use tokio_util::sync::CancellationToken;

/// Shared cancellation source for everything the broker spawns.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token to hand to a task that should stop when the server does.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel every outstanding token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
