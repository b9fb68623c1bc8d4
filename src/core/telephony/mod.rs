//! Telephony media-stream side of a call.
//!
//! Models the Twilio Media Streams wire protocol and wraps the server side
//! of one media-stream WebSocket connection.

pub mod channel;
pub mod messages;

pub use channel::TelephonyChannel;
pub use messages::{
    MarkLabel, MediaFrame, PlaybackPayload, StreamStart, TelephonyCommand, TelephonyEvent,
};
