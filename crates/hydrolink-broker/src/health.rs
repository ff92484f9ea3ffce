//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Devices with at least one live connection.
    pub device_sessions: usize,
    /// Total live device connections.
    pub device_connections: usize,
    /// Dashboard subscribers (specific plus global).
    pub subscribers: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    device_sessions: usize,
    device_connections: usize,
    subscribers: usize,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        device_sessions,
        device_connections,
        subscribers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), 0, 0, 0);
        assert_eq!(resp.status, "ok");
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, 0, 0, 0);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn counters_tracked() {
        let resp = health_check(Instant::now(), 2, 3, 5);
        assert_eq!(resp.device_sessions, 2);
        assert_eq!(resp.device_connections, 3);
        assert_eq!(resp.subscribers, 5);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), 1, 1, 4);
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["device_sessions"], 1);
        assert_eq!(parsed["subscribers"], 4);
        assert!(parsed["uptime_secs"].is_number());
    }
}
