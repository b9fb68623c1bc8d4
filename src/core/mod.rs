pub mod channel;
pub mod realtime;
pub mod relay;
pub mod telephony;

// Re-export commonly used types for convenience
pub use channel::{Channel, ChannelError, ChannelResult};

pub use realtime::{
    DEFAULT_REALTIME_MODEL, REALTIME_API_URL, RealtimeChannel, RealtimeConfig, RealtimeVoice,
};

pub use relay::{CallSession, RelayControl, RelayController};

pub use telephony::{TelephonyChannel, TelephonyCommand, TelephonyEvent};
