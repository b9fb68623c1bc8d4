//! Media-stream WebSocket handler.
//!
//! Upgrades the telephony platform's connection to a WebSocket and runs one
//! call session on it until either side hangs up.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::SinkExt;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::core::realtime::config::RealtimeConfig;
use crate::core::relay::session::CallSession;
use crate::state::AppState;

/// Maximum WebSocket frame size (1 MB). Media frames are tiny; anything
/// larger is not a media stream.
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Media-stream WebSocket handler
///
/// Upgrades the HTTP connection to WebSocket and bridges the call to a
/// realtime speech session.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("media stream connection upgrade requested");

    let realtime_config = state.realtime_config();
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, realtime_config))
}

async fn handle_media_socket(mut socket: WebSocket, config: Option<RealtimeConfig>) {
    let call_id = Uuid::new_v4();

    async move {
        let Some(config) = config else {
            warn!("no realtime API key configured, rejecting call");
            let _ = socket.close().await;
            return;
        };

        info!("telephony client connected");
        match CallSession::connect(socket, &config).await {
            Ok(session) => session.run().await,
            Err(e) => error!("failed to establish call session: {e}"),
        }
    }
    .instrument(info_span!("call", %call_id))
    .await
}
