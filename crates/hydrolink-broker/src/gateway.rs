//! Connection gateway: route-level validation before the WebSocket upgrade.
//!
//! Identifiers are validated once, in the path extractor: `Path<DeviceUuid>`
//! and `Path<SubscribeTarget>` reject anything that is not a strict UUID v4
//! (or the literal `all`). Rejections are surfaced as structured
//! `{"error": ...}` bodies: 400 for a bad identifier, 401 for a missing
//! credential header, 503 when the connection limit is reached. Credential
//! validity is only checked after the upgrade, where failures map to
//! 4000-range close codes.

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, warn};

use hydrolink_core::{DeviceUuid, SubscribeTarget};

use crate::server::AppState;
use crate::websocket::{dashboard, device};

/// Header carrying the device's credential.
const DEVICE_TOKEN_HEADER: &str = "device-token";

/// GET `/ws/device/{device_uuid}`
///
/// Checks run in order: identifier shape (400), connection limit (503),
/// credential presence (401), upgrade headers. Only a request passing all
/// four reaches [`device::run_device_session`].
pub async fn device_ws(
    path: Result<Path<DeviceUuid>, PathRejection>,
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Path(device_uuid) = match path {
        Ok(path) => path,
        Err(rejection) => return bad_request(&rejection.body_text()),
    };

    if at_capacity(&state).await {
        warn!(device = %device_uuid, "connection limit reached, refusing device");
        return capacity_exceeded();
    }

    let Some(token) = header_value(&headers, DEVICE_TOKEN_HEADER) else {
        debug!(device = %device_uuid, "device connect without token header");
        return unauthorized("missing device-token header");
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| device::run_device_session(socket, device_uuid, token, state))
}

/// GET `/ws/dashboard/{target}`
pub async fn dashboard_ws(
    path: Result<Path<SubscribeTarget>, PathRejection>,
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Path(target) = match path {
        Ok(path) => path,
        Err(rejection) => return bad_request(&rejection.body_text()),
    };

    if at_capacity(&state).await {
        warn!(target = %target, "connection limit reached, refusing dashboard");
        return capacity_exceeded();
    }

    let Some(token) = bearer_token(&headers) else {
        debug!(target = %target, "dashboard connect without bearer token");
        return unauthorized("missing bearer token");
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| dashboard::run_dashboard_session(socket, target, token, state))
}

/// Whether the broker already holds `max_connections` live connections,
/// device and dashboard combined.
async fn at_capacity(state: &AppState) -> bool {
    let open = state.broker.device_connection_count().await + state.broker.subscriber_count().await;
    open >= state.config.max_connections
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_owned())
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

fn capacity_exceeded() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "connection limit reached" })),
    )
        .into_response()
}
