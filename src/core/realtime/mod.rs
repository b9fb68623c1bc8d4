//! Realtime speech-to-speech side of a call.
//!
//! WebSocket client plumbing and wire types for the OpenAI Realtime API,
//! restricted to what the relay needs: session configuration, caller audio
//! append, synthesized audio deltas, speech-started interruption triggers,
//! and response truncation.

pub mod client;
pub mod config;
pub mod messages;

pub use client::RealtimeChannel;
pub use config::{
    DEFAULT_REALTIME_MODEL, REALTIME_API_URL, RealtimeConfig, RealtimeVoice,
    TELEPHONY_AUDIO_FORMAT,
};
pub use messages::{ClientEvent, ServerEvent, SessionConfig, TurnDetection};
