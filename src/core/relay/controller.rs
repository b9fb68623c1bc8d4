//! Relay timing and interruption state machine.
//!
//! One controller per call mediates between the telephony stream and the
//! realtime session: it forwards audio both ways, tracks the caller-clock
//! timing needed to compute truncation offsets, and issues truncate/clear
//! commands when the caller starts talking over an in-flight response.
//!
//! The controller is generic over its two channels so the state machine can
//! be driven in tests with in-memory channels and no network transport.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::core::channel::{Channel, ChannelError};
use crate::core::realtime::messages::{ClientEvent, ServerEvent};
use crate::core::telephony::messages::{
    MarkLabel, PlaybackPayload, TelephonyCommand, TelephonyEvent,
};

/// Label attached to playback marks; one queue token per outstanding chunk.
const PLAYBACK_MARK: &str = "responsePart";

/// What the session loop should do after an event has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayControl {
    /// Keep pumping events
    Continue,
    /// Tear the call down
    Hangup,
}

/// Per-call relay state machine.
pub struct RelayController<T, A>
where
    T: Channel<Outbound = TelephonyCommand>,
    A: Channel<Outbound = ClientEvent>,
{
    telephony: T,
    realtime: A,

    /// Stream identifier, set once the telephony side starts its stream
    stream_sid: Option<String>,
    /// Caller-clock timestamp (ms) of the most recent inbound audio frame
    latest_media_timestamp: u64,
    /// Caller-clock timestamp at which the current response began playing
    response_start_timestamp: Option<u64>,
    /// Item id of the in-flight assistant response, if any
    last_assistant_item: Option<String>,
    /// Outstanding playback acknowledgements, oldest first
    mark_queue: VecDeque<String>,
    /// Set on shutdown; a closed controller processes nothing
    closed: bool,
}

impl<T, A> RelayController<T, A>
where
    T: Channel<Outbound = TelephonyCommand>,
    A: Channel<Outbound = ClientEvent>,
{
    pub fn new(telephony: T, realtime: A) -> Self {
        Self {
            telephony,
            realtime,
            stream_sid: None,
            latest_media_timestamp: 0,
            response_start_timestamp: None,
            last_assistant_item: None,
            mark_queue: VecDeque::new(),
            closed: false,
        }
    }

    /// Handle one message from the telephony side.
    pub async fn handle_telephony_event(
        &mut self,
        event: TelephonyEvent,
    ) -> Result<RelayControl, ChannelError> {
        if self.closed {
            return Ok(RelayControl::Hangup);
        }

        match event {
            TelephonyEvent::Start { start } => {
                info!(stream_sid = %start.stream_sid, "media stream started");
                self.stream_sid = Some(start.stream_sid);
                self.latest_media_timestamp = 0;
                self.response_start_timestamp = None;
            }

            TelephonyEvent::Media { media } => {
                // Late frames are accepted but never move the clock backward.
                self.latest_media_timestamp = self.latest_media_timestamp.max(media.timestamp);

                if self.realtime.is_open() {
                    self.realtime
                        .send(ClientEvent::InputAudioBufferAppend {
                            audio: media.payload,
                        })
                        .await?;
                } else {
                    // Real-time relay, not a queue: nowhere to put the frame.
                    debug!("realtime channel not open, dropping caller audio frame");
                }
            }

            TelephonyEvent::Mark { .. } => {
                // Acknowledgements may straggle in after a reset; an empty
                // queue is not an error.
                if self.mark_queue.pop_front().is_none() {
                    debug!("mark acknowledged with empty queue");
                }
            }

            TelephonyEvent::Stop => {
                info!("media stream stopped");
                return Ok(RelayControl::Hangup);
            }

            TelephonyEvent::Connected { protocol } => {
                debug!(?protocol, "telephony client handshake");
            }

            TelephonyEvent::Other => {
                debug!("ignoring non-media telephony event");
            }
        }

        Ok(RelayControl::Continue)
    }

    /// Handle one event from the realtime session.
    pub async fn handle_realtime_event(
        &mut self,
        event: ServerEvent,
    ) -> Result<RelayControl, ChannelError> {
        if self.closed {
            return Ok(RelayControl::Hangup);
        }

        match event {
            ServerEvent::AudioDelta { delta, item_id, .. } => {
                self.forward_audio_delta(delta, item_id).await?;
            }

            ServerEvent::SpeechStarted { .. } => {
                self.handle_speech_started().await?;
            }

            ServerEvent::Error { error } => {
                warn!(code = ?error.code, "realtime session error: {}", error.message);
            }

            other => {
                info!(event = other.kind(), "realtime event");
            }
        }

        Ok(RelayControl::Continue)
    }

    /// Close both channels and stop processing. Idempotent; each channel is
    /// closed exactly once.
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.realtime.close().await;
        self.telephony.close().await;
    }

    /// Forward one synthesized audio chunk to the caller and account for it
    /// in the playback bookkeeping.
    async fn forward_audio_delta(
        &mut self,
        delta: String,
        item_id: Option<String>,
    ) -> Result<(), ChannelError> {
        let Some(stream_sid) = self.stream_sid.clone() else {
            debug!("audio delta before stream start, dropping");
            return Ok(());
        };

        self.telephony
            .send(TelephonyCommand::Media {
                stream_sid: stream_sid.clone(),
                media: PlaybackPayload { payload: delta },
            })
            .await?;

        // The first delta of a response anchors its start in the caller's
        // local timeline; later deltas of the same response leave it alone.
        if self.response_start_timestamp.is_none() {
            self.response_start_timestamp = Some(self.latest_media_timestamp);
        }
        if let Some(item_id) = item_id {
            self.last_assistant_item = Some(item_id);
        }

        self.telephony
            .send(TelephonyCommand::Mark {
                stream_sid,
                mark: MarkLabel {
                    name: PLAYBACK_MARK.to_string(),
                },
            })
            .await?;
        self.mark_queue.push_back(PLAYBACK_MARK.to_string());

        Ok(())
    }

    /// The caller started speaking. If a response is mid-playback, truncate
    /// it at the elapsed caller-clock playback time and flush queued audio;
    /// otherwise this is a no-op.
    async fn handle_speech_started(&mut self) -> Result<(), ChannelError> {
        let Some(started) = self.response_start_timestamp else {
            debug!("speech started with no response in flight");
            return Ok(());
        };
        if self.mark_queue.is_empty() {
            debug!("speech started with no playback outstanding");
            return Ok(());
        }

        // Caller-clock playback time of the current response: how much of it
        // the caller actually heard.
        let elapsed = self.latest_media_timestamp.saturating_sub(started);
        debug!(elapsed_ms = elapsed, "caller interrupted in-flight response");

        if let Some(item_id) = self.last_assistant_item.clone() {
            self.realtime
                .send(ClientEvent::ConversationItemTruncate {
                    item_id,
                    content_index: 0,
                    audio_end_ms: elapsed,
                })
                .await?;
        }

        if let Some(stream_sid) = self.stream_sid.clone() {
            self.telephony
                .send(TelephonyCommand::Clear { stream_sid })
                .await?;
        }

        self.mark_queue.clear();
        self.last_assistant_item = None;
        self.response_start_timestamp = None;

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
