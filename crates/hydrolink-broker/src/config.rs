//! Broker configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the broker server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections, devices and dashboards
    /// combined. New upgrades beyond the limit get a 503.
    pub max_connections: usize,
    /// Keepalive ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How many records a fresh subscription replays.
    pub history_replay_limit: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            history_replay_limit: 10,
            send_queue_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_is_loopback_auto_port() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_replay_limit_is_ten() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.history_replay_limit, 10);
    }

    #[test]
    fn default_heartbeat_settings() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.heartbeat_interval_secs, 30);
        assert_eq!(cfg.heartbeat_timeout_secs, 90);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = BrokerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: BrokerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.max_message_size, cfg.max_message_size);
        assert_eq!(back.send_queue_size, cfg.send_queue_size);
    }

    #[test]
    fn custom_values() {
        let cfg = BrokerConfig {
            host: "0.0.0.0".into(),
            port: 9520,
            max_connections: 10,
            ..BrokerConfig::default()
        };
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9520);
        assert_eq!(cfg.max_connections, 10);
    }
}
