//! `BrokerServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tracing::info;

use hydrolink_core::{DeviceRegistry, HistoryStore, IdentityVerifier};

use crate::config::BrokerConfig;
use crate::gateway;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::Broker;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection state and fan-out.
    pub broker: Arc<Broker>,
    /// Device credential and identifier lookups.
    pub devices: Arc<dyn DeviceRegistry>,
    /// Telemetry persistence and replay queries.
    pub history: Arc<dyn HistoryStore>,
    /// Dashboard bearer verification.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Server configuration.
    pub config: Arc<BrokerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// The broker server.
pub struct BrokerServer {
    config: Arc<BrokerConfig>,
    broker: Arc<Broker>,
    devices: Arc<dyn DeviceRegistry>,
    history: Arc<dyn HistoryStore>,
    verifier: Arc<dyn IdentityVerifier>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl BrokerServer {
    /// Create a new server over the given collaborators.
    pub fn new(
        config: BrokerConfig,
        devices: Arc<dyn DeviceRegistry>,
        history: Arc<dyn HistoryStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            broker: Arc::new(Broker::new()),
            devices,
            history,
            verifier,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            broker: self.broker.clone(),
            devices: self.devices.clone(),
            history: self.history.clone(),
            verifier: self.verifier.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            shutdown: self.shutdown.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws/device/{device_uuid}", get(gateway::device_ws))
            .route("/ws/dashboard/{target}", get(gateway::dashboard_ws))
            .with_state(state)
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve. Returns the local address and a join handle; the
    /// server runs until the shutdown coordinator fires.
    ///
    /// # Errors
    ///
    /// Returns the bind or local-address error from the listener.
    pub async fn listen(&self) -> Result<ServerHandle, std::io::Error> {
        let router = self.router();
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "broker listening");

        let token = self.shutdown.token();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "server error");
            }
        });

        Ok(ServerHandle {
            addr: local_addr,
            task,
        })
    }

    /// Get the broker state.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

/// Handle returned by [`BrokerServer::listen`].
pub struct ServerHandle {
    /// The bound local address.
    pub addr: SocketAddr,
    /// The accept-loop task.
    pub task: tokio::task::JoinHandle<()>,
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let resp = health::health_check(
        state.start_time,
        state.broker.device_session_count().await,
        state.broker.device_connection_count().await,
        state.broker.subscriber_count().await,
    );
    Json(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use hydrolink_core::{
        AuthError, DeviceRecord, DeviceUuid, NewTelemetryRecord, StoreError, SubjectId,
        TelemetryRecord,
    };
    use tower::ServiceExt;

    struct EmptyRegistry;

    #[async_trait]
    impl DeviceRegistry for EmptyRegistry {
        async fn find_by_credential(
            &self,
            _uuid: &DeviceUuid,
            _token: &str,
        ) -> Result<Option<DeviceRecord>, StoreError> {
            Ok(None)
        }

        async fn find_by_id(
            &self,
            _uuid: &DeviceUuid,
        ) -> Result<Option<DeviceRecord>, StoreError> {
            Ok(None)
        }
    }

    struct EmptyHistory;

    #[async_trait]
    impl HistoryStore for EmptyHistory {
        async fn append(&self, _record: NewTelemetryRecord) -> Result<(), StoreError> {
            Ok(())
        }

        async fn recent(
            &self,
            _uuid: &DeviceUuid,
            _limit: usize,
        ) -> Result<Vec<TelemetryRecord>, StoreError> {
            Ok(vec![])
        }
    }

    struct RejectAll;

    #[async_trait]
    impl IdentityVerifier for RejectAll {
        async fn verify(&self, _token: &str) -> Result<SubjectId, AuthError> {
            Err(AuthError::InvalidToken)
        }
    }

    fn make_server() -> BrokerServer {
        BrokerServer::new(
            BrokerConfig::default(),
            Arc::new(EmptyRegistry),
            Arc::new(EmptyHistory),
            Arc::new(RejectAll),
        )
    }

    #[tokio::test]
    async fn health_endpoint_returns_counters() {
        let app = make_server().router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["device_sessions"], 0);
        assert_eq!(parsed["device_connections"], 0);
        assert_eq!(parsed["subscribers"], 0);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_device_uuid_is_rejected_pre_upgrade() {
        let app = make_server().router();

        // v1 uuid: wrong version nibble
        let req = Request::builder()
            .uri("/ws/device/11111111-1111-1111-8111-111111111111")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_dashboard_target_is_rejected_pre_upgrade() {
        let app = make_server().router();

        let req = Request::builder()
            .uri("/ws/dashboard/everything")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["error"].is_string());
    }

    #[tokio::test]
    async fn at_capacity_broker_refuses_new_connections() {
        let server = BrokerServer::new(
            BrokerConfig {
                max_connections: 0,
                ..BrokerConfig::default()
            },
            Arc::new(EmptyRegistry),
            Arc::new(EmptyHistory),
            Arc::new(RejectAll),
        );
        let app = server.router();

        let req = Request::builder()
            .uri("/ws/device/11111111-1111-4111-8111-111111111111")
            .header("device-token", "abc")
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .header("sec-websocket-version", "13")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["error"], "connection limit reached");
    }

    #[tokio::test]
    async fn capacity_applies_to_dashboards_too() {
        let server = BrokerServer::new(
            BrokerConfig {
                max_connections: 0,
                ..BrokerConfig::default()
            },
            Arc::new(EmptyRegistry),
            Arc::new(EmptyHistory),
            Arc::new(RejectAll),
        );
        let app = server.router();

        let req = Request::builder()
            .uri("/ws/dashboard/all")
            .header("authorization", "Bearer some.jwt.here")
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .header("sec-websocket-version", "13")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn server_with_custom_config() {
        let config = BrokerConfig {
            host: "0.0.0.0".into(),
            port: 9520,
            ..BrokerConfig::default()
        };
        let server = BrokerServer::new(
            config,
            Arc::new(EmptyRegistry),
            Arc::new(EmptyHistory),
            Arc::new(RejectAll),
        );
        assert_eq!(server.config().host, "0.0.0.0");
        assert_eq!(server.config().port, 9520);
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
        server.shutdown().shutdown();
        assert!(server.shutdown().is_shutting_down());
    }
}
