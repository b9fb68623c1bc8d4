//! Realtime API client channel.
//!
//! WebSocket client for the OpenAI Realtime API. One `RealtimeChannel` is
//! opened per call; a spawned connection task pumps outbound client events
//! from an mpsc queue and hands parsed server events back through another,
//! consumed by the owning call session in arrival order.
//!
//! There is no automatic reconnection: a transport failure is terminal for
//! the call and tears the session down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use super::config::RealtimeConfig;
use super::messages::{ClientEvent, ServerEvent, SessionConfig};
use crate::core::channel::{Channel, ChannelError, ChannelResult};

/// Channel capacity for outbound client events.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Buffer for parsed server events awaiting the session loop.
const EVENT_BUFFER: usize = 1024;

/// How long to wait for the endpoint's session-created handshake before
/// sending the initial configuration anyway.
const READY_FALLBACK: Duration = Duration::from_millis(1000);

/// WebSocket client channel to the realtime endpoint.
pub struct RealtimeChannel {
    ws_tx: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    connected: Arc<AtomicBool>,
    ready_rx: Option<oneshot::Receiver<()>>,
}

impl RealtimeChannel {
    /// Connect to the realtime endpoint. Returns the channel plus the stream
    /// of parsed server events, yielded once each in arrival order.
    pub async fn connect(
        config: &RealtimeConfig,
    ) -> ChannelResult<(Self, mpsc::Receiver<ServerEvent>)> {
        let url = config.ws_url();
        let parsed =
            Url::parse(&url).map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| {
                ChannelError::ConnectionFailed(format!("no host in realtime url: {url}"))
            })?
            .to_string();
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };

        let request = http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        tracing::info!(model = %config.model, "connected to realtime endpoint");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (ws_tx, mut ws_rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel::<()>();

        let connected = Arc::new(AtomicBool::new(true));
        let task_connected = connected.clone();

        tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            loop {
                tokio::select! {
                    outbound = ws_rx.recv() => {
                        let Some(event) = outbound else {
                            // Send half dropped: the session is closing.
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!("failed to serialize client event: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::warn!("realtime socket send failed: {e}");
                            break;
                        }
                    }

                    inbound = ws_stream.next() => {
                        match inbound {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => {
                                        if matches!(event, ServerEvent::SessionCreated { .. })
                                            && let Some(tx) = ready_tx.take()
                                        {
                                            let _ = tx.send(());
                                        }
                                        if event_tx.send(event).await.is_err() {
                                            // Session loop gone.
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        // One unrecognized frame must not kill a
                                        // live call; log what it was and move on.
                                        match event_type_of(&text) {
                                            Some(kind) => tracing::debug!(
                                                event = %kind,
                                                "ignoring unhandled realtime event"
                                            ),
                                            None => tracing::warn!(
                                                "dropping malformed realtime frame: {e}"
                                            ),
                                        }
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if ws_sink.send(Message::Pong(data)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!("realtime socket closed by peer");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!("realtime socket error: {e}");
                                break;
                            }
                        }
                    }
                }
            }
            task_connected.store(false, Ordering::SeqCst);
            tracing::debug!("realtime connection task ended");
        });

        let channel = Self {
            ws_tx: Mutex::new(Some(ws_tx)),
            connected,
            ready_rx: Some(ready_rx),
        };
        Ok((channel, event_rx))
    }

    /// Send the initial session configuration, gated on the endpoint's
    /// session-created handshake rather than a bare sleep. Falls back to a
    /// fixed delay if the handshake does not arrive in time.
    pub async fn configure(&mut self, session: SessionConfig) -> ChannelResult<()> {
        if let Some(ready) = self.ready_rx.take() {
            match tokio::time::timeout(READY_FALLBACK, ready).await {
                Ok(Ok(())) => {}
                // The connection task ended before the handshake.
                Ok(Err(_)) => return Err(ChannelError::Closed),
                Err(_) => tracing::warn!(
                    "no session-created handshake within {READY_FALLBACK:?}, \
                     sending configuration anyway"
                ),
            }
        }
        self.send(ClientEvent::SessionUpdate { session }).await
    }
}

/// Best-effort extraction of the `type` field from an unparsed frame.
fn event_type_of(text: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("type")?
        .as_str()
        .map(str::to_owned)
}

#[async_trait]
impl Channel for RealtimeChannel {
    type Outbound = ClientEvent;

    async fn send(&self, message: ClientEvent) -> ChannelResult<()> {
        let guard = self.ws_tx.lock().await;
        let Some(tx) = guard.as_ref() else {
            return Err(ChannelError::Closed);
        };
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        tx.send(message).await.map_err(|_| ChannelError::Closed)
    }

    fn is_open(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the sender ends the connection task's outbound arm, which
        // sends a close frame on its way out.
        self.ws_tx.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_of() {
        assert_eq!(
            event_type_of(r#"{"type": "response.text.delta", "delta": "x"}"#).as_deref(),
            Some("response.text.delta")
        );
        assert_eq!(event_type_of("not json"), None);
        assert_eq!(event_type_of(r#"{"delta": "x"}"#), None);
    }
}
