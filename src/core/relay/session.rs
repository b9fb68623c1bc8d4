//! Per-call session wiring.
//!
//! A call session owns the two channels of one phone call and the relay
//! controller that mediates between them. All session state is owned by a
//! single task: events from either side are processed one at a time in
//! arrival order, so the controller needs no locking.

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use futures::stream::SplitStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::channel::{Channel, ChannelError};
use crate::core::realtime::client::RealtimeChannel;
use crate::core::realtime::config::RealtimeConfig;
use crate::core::realtime::messages::ServerEvent;
use crate::core::relay::controller::{RelayControl, RelayController};
use crate::core::telephony::channel::TelephonyChannel;
use crate::core::telephony::messages::TelephonyEvent;

/// One phone call's relay: both channels plus the controller between them.
pub struct CallSession {
    controller: RelayController<TelephonyChannel, RealtimeChannel>,
    telephony_rx: SplitStream<WebSocket>,
    realtime_rx: mpsc::Receiver<ServerEvent>,
}

impl CallSession {
    /// Establish the session for a freshly upgraded telephony socket: open
    /// the realtime channel and send its initial configuration. On failure
    /// the telephony side is closed before returning.
    pub async fn connect(
        socket: WebSocket,
        config: &RealtimeConfig,
    ) -> Result<Self, ChannelError> {
        let (ws_sink, telephony_rx) = socket.split();
        let telephony = TelephonyChannel::new(ws_sink);

        let (mut realtime, realtime_rx) = match RealtimeChannel::connect(config).await {
            Ok(pair) => pair,
            Err(e) => {
                telephony.close().await;
                return Err(e);
            }
        };

        if let Err(e) = realtime.configure(config.session_config()).await {
            realtime.close().await;
            telephony.close().await;
            return Err(e);
        }

        Ok(Self {
            controller: RelayController::new(telephony, realtime),
            telephony_rx,
            realtime_rx,
        })
    }

    /// Pump events from both channels into the relay controller until either
    /// side closes or fails, then tear the whole call down.
    pub async fn run(self) {
        let CallSession {
            mut controller,
            mut telephony_rx,
            mut realtime_rx,
        } = self;

        loop {
            let control = tokio::select! {
                frame = telephony_rx.next() => {
                    handle_telephony_frame(&mut controller, frame).await
                }
                event = realtime_rx.recv() => {
                    handle_realtime_event(&mut controller, event).await
                }
            };

            match control {
                Ok(RelayControl::Continue) => {}
                Ok(RelayControl::Hangup) => break,
                Err(e) => {
                    warn!("channel failure, tearing down call: {e}");
                    break;
                }
            }
        }

        controller.shutdown().await;
        info!("call session ended");
    }
}

async fn handle_telephony_frame(
    controller: &mut RelayController<TelephonyChannel, RealtimeChannel>,
    frame: Option<Result<Message, axum::Error>>,
) -> Result<RelayControl, ChannelError> {
    match frame {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<TelephonyEvent>(&text) {
            Ok(event) => controller.handle_telephony_event(event).await,
            Err(e) => {
                // One bad frame must not kill a live call.
                warn!("dropping malformed telephony frame: {e}");
                Ok(RelayControl::Continue)
            }
        },
        Some(Ok(Message::Close(_))) | None => {
            info!("telephony client disconnected");
            Ok(RelayControl::Hangup)
        }
        Some(Ok(_)) => Ok(RelayControl::Continue),
        Some(Err(e)) => Err(ChannelError::ReceiveFailed(e.to_string())),
    }
}

async fn handle_realtime_event(
    controller: &mut RelayController<TelephonyChannel, RealtimeChannel>,
    event: Option<ServerEvent>,
) -> Result<RelayControl, ChannelError> {
    match event {
        Some(event) => controller.handle_realtime_event(event).await,
        None => {
            info!("realtime session closed");
            Ok(RelayControl::Hangup)
        }
    }
}
