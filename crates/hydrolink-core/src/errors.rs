//! Error taxonomy for the broker and its collaborators.
//!
//! Only [`BrokerError::Protocol`] and [`BrokerError::Auth`] ever terminate a
//! connection. Message-format problems are reported back over the open
//! connection, delivery failures are logged and skipped, and a command
//! against an offline device surfaces synchronously to the caller.

use thiserror::Error;

/// Top-level error type for broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Malformed path, identifier, or missing header. Terminates pre-upgrade.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Unresolvable credential or ownership mismatch. Terminates with a
    /// 4000-range close code.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Malformed inbound frame. Reported on the open connection.
    #[error("message format error: {0}")]
    MessageFormat(String),

    /// A fan-out send to one subscriber failed. Logged and skipped.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Command target has no live connections. Nothing was sent.
    #[error("device {0} has no live connections")]
    NotConnected(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors from the device registry and history store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Row could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem-level failure.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Errors from bearer-credential verification.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("missing token")]
    MissingToken,

    /// The credential is malformed or its signature is wrong.
    #[error("invalid token")]
    InvalidToken,

    /// The credential has expired.
    #[error("token expired")]
    Expired,

    /// Verification failed for another reason.
    #[error("verification failed: {0}")]
    Verification(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
