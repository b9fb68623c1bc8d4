//! Health check and call-control endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::state::AppState;

/// Liveness probe.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "callbridge-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Answer an inbound call notification with a call-control document that
/// points the telephony platform at this server's media-stream endpoint.
///
/// The stream URL is built from the request's `Host` header so the document
/// stays correct behind tunnels and load balancers.
pub async fn incoming_call(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| state.config.address());

    let twiml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Say>Please wait while we connect your call to the voice assistant.</Say>
    <Pause length="1"/>
    <Say>You can start talking now.</Say>
    <Connect>
        <Stream url="wss://{host}/media-stream" />
    </Connect>
</Response>"#
    );

    ([(header::CONTENT_TYPE, "text/xml")], twiml).into_response()
}
