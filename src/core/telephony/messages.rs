//! Telephony media-stream WebSocket message types.
//!
//! These types model the Twilio Media Streams wire protocol. All messages
//! are JSON-encoded and tagged on the `event` field.
//!
//! # Protocol Overview
//!
//! Platform events (received from the telephony side):
//! - connected - WebSocket handshake acknowledgement
//! - start - Stream metadata, carries the stream SID
//! - media - One caller audio frame with its presentation timestamp
//! - mark - A previously sent mark label has finished playing
//! - stop - The stream is shutting down
//!
//! Relay commands (sent to the telephony side):
//! - media - Synthesized audio for playback
//! - mark - Request a playback acknowledgement for the audio sent so far
//! - clear - Discard queued-but-unplayed audio

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Platform Events (received)
// =============================================================================

/// Events received from the telephony platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Handshake message sent once after the WebSocket opens
    Connected {
        /// Protocol name advertised by the platform
        #[serde(default)]
        protocol: Option<String>,
    },

    /// Stream metadata; arrives before any media frame
    Start {
        /// Stream details
        start: StreamStart,
    },

    /// One caller audio frame
    Media {
        /// Frame timing and payload
        media: MediaFrame,
    },

    /// Acknowledgement that playback reached a previously sent mark
    Mark {
        /// Echoed mark label
        #[serde(default)]
        mark: Option<MarkLabel>,
    },

    /// The stream is shutting down
    Stop,

    /// Any other event type; logged and otherwise ignored by the relay
    #[serde(other)]
    Other,
}

/// Stream metadata carried by the `start` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamStart {
    /// Identifier the platform assigns to this media stream
    #[serde(rename = "streamSid")]
    pub stream_sid: String,

    /// Call this stream belongs to
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,

    /// Account that owns the call
    #[serde(rename = "accountSid", default)]
    pub account_sid: Option<String>,
}

/// One inbound audio frame.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaFrame {
    /// Presentation timestamp in milliseconds relative to stream start.
    /// The platform serializes this as a string; accept either form.
    #[serde(deserialize_with = "de_millis")]
    pub timestamp: u64,

    /// Base64-encoded audio payload
    pub payload: String,

    /// Which leg of the call the frame belongs to
    #[serde(default)]
    pub track: Option<String>,

    /// Frame sequence within the stream
    #[serde(default)]
    pub chunk: Option<String>,
}

/// Label attached to a mark command and echoed back on acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkLabel {
    /// Mark name
    pub name: String,
}

fn de_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(u64),
        Text(String),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Number(n) => Ok(n),
        Millis::Text(s) => s.parse::<u64>().map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Relay Commands (sent)
// =============================================================================

/// Commands sent to the telephony platform.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyCommand {
    /// Synthesized audio for playback
    Media {
        /// Stream the audio belongs to
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Audio payload
        media: PlaybackPayload,
    },

    /// Ask the platform to echo this label back once playback reaches it
    Mark {
        /// Stream the mark belongs to
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Label to echo back
        mark: MarkLabel,
    },

    /// Discard any queued-but-unplayed audio
    Clear {
        /// Stream whose playback buffer is flushed
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Outbound audio payload.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackPayload {
    /// Base64-encoded audio payload
    pub payload: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_event() {
        let raw = json!({
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "streamSid": "MZ0123",
                "callSid": "CA0123",
                "accountSid": "AC0123",
                "tracks": ["inbound"],
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            },
            "streamSid": "MZ0123"
        });

        let event: TelephonyEvent = serde_json::from_value(raw).unwrap();
        match event {
            TelephonyEvent::Start { start } => {
                assert_eq!(start.stream_sid, "MZ0123");
                assert_eq!(start.call_sid.as_deref(), Some("CA0123"));
            }
            other => panic!("expected start event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_media_timestamp_string_or_number() {
        let from_string: TelephonyEvent = serde_json::from_value(json!({
            "event": "media",
            "media": {"track": "inbound", "chunk": "2", "timestamp": "1540", "payload": "bm8="}
        }))
        .unwrap();
        let from_number: TelephonyEvent = serde_json::from_value(json!({
            "event": "media",
            "media": {"timestamp": 1540, "payload": "bm8="}
        }))
        .unwrap();

        for event in [from_string, from_number] {
            match event {
                TelephonyEvent::Media { media } => {
                    assert_eq!(media.timestamp, 1540);
                    assert_eq!(media.payload, "bm8=");
                }
                other => panic!("expected media event, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_mark_acknowledgement() {
        let event: TelephonyEvent = serde_json::from_value(json!({
            "event": "mark",
            "streamSid": "MZ0123",
            "mark": {"name": "responsePart"}
        }))
        .unwrap();

        match event {
            TelephonyEvent::Mark { mark } => {
                assert_eq!(mark.unwrap().name, "responsePart");
            }
            other => panic!("expected mark event, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_other() {
        let event: TelephonyEvent =
            serde_json::from_value(json!({"event": "dtmf", "dtmf": {"digit": "5"}})).unwrap();
        assert!(matches!(event, TelephonyEvent::Other));
    }

    #[test]
    fn test_stop_event_tolerates_extra_fields() {
        let event: TelephonyEvent = serde_json::from_value(json!({
            "event": "stop",
            "stop": {"accountSid": "AC0123", "callSid": "CA0123"},
            "streamSid": "MZ0123"
        }))
        .unwrap();
        assert!(matches!(event, TelephonyEvent::Stop));
    }

    #[test]
    fn test_serialize_media_command() {
        let command = TelephonyCommand::Media {
            stream_sid: "MZ0123".to_string(),
            media: PlaybackPayload {
                payload: "c3ludGg=".to_string(),
            },
        };

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["event"], "media");
        assert_eq!(value["streamSid"], "MZ0123");
        assert_eq!(value["media"]["payload"], "c3ludGg=");
    }

    #[test]
    fn test_serialize_clear_command() {
        let command = TelephonyCommand::Clear {
            stream_sid: "MZ0123".to_string(),
        };

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value, json!({"event": "clear", "streamSid": "MZ0123"}));
    }
}
