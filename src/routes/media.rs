//! Media-stream WebSocket route configuration
//!
//! This module configures the WebSocket endpoint the telephony platform is
//! pointed at by the call-control document.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media::media_stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media-stream WebSocket router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for one phone call's audio relay
///
/// # Protocol
///
/// After the upgrade the platform sends `connected`, `start`, then `media`
/// frames; the relay answers with `media`, `mark`, and `clear` commands.
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media-stream", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
