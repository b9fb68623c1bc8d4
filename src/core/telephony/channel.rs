//! Send half of the telephony media stream.
//!
//! Wraps the sink side of an upgraded WebSocket behind an mpsc queue drained
//! by a dedicated sender task, so the relay can fan playback messages in
//! without holding the socket across await points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::messages::TelephonyCommand;
use crate::core::channel::{Channel, ChannelError, ChannelResult};

/// Buffer for commands awaiting the sender task.
const OUTBOUND_BUFFER: usize = 256;

/// Route for messages headed to the telephony socket.
enum TelephonyRoute {
    Outgoing(TelephonyCommand),
    Close,
}

/// Send half of one telephony media-stream connection.
#[derive(Clone)]
pub struct TelephonyChannel {
    tx: mpsc::Sender<TelephonyRoute>,
    open: Arc<AtomicBool>,
}

impl TelephonyChannel {
    /// Wrap the sink half of an upgraded telephony WebSocket. The spawned
    /// sender task serializes and transmits queued commands until the socket
    /// fails or a close is requested.
    pub fn new(mut sink: SplitSink<WebSocket, Message>) -> Self {
        let (tx, mut rx) = mpsc::channel::<TelephonyRoute>(OUTBOUND_BUFFER);
        let open = Arc::new(AtomicBool::new(true));
        let task_open = open.clone();

        tokio::spawn(async move {
            while let Some(route) = rx.recv().await {
                let result = match route {
                    TelephonyRoute::Outgoing(command) => match serde_json::to_string(&command) {
                        Ok(json) => sink.send(Message::Text(json.into())).await,
                        Err(e) => {
                            error!("failed to serialize telephony command: {e}");
                            continue;
                        }
                    },
                    TelephonyRoute::Close => {
                        debug!("closing telephony socket");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                };

                if let Err(e) = result {
                    warn!("telephony socket send failed: {e}");
                    break;
                }
            }
            task_open.store(false, Ordering::SeqCst);
        });

        Self { tx, open }
    }
}

#[async_trait]
impl Channel for TelephonyChannel {
    type Outbound = TelephonyCommand;

    async fn send(&self, message: TelephonyCommand) -> ChannelResult<()> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        self.tx
            .send(TelephonyRoute::Outgoing(message))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.tx.send(TelephonyRoute::Close).await;
        }
    }
}
