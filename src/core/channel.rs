//! Duplex channel abstraction shared by both sides of a call.
//!
//! A channel wraps one streaming connection (telephony or realtime) and
//! exposes a typed send half plus open/close state. The receive half is
//! handed back by the concrete implementation at construction time as a
//! stream of inbound messages, consumed once in arrival order.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by channel transport operations.
///
/// A `ChannelError` is never retried at this layer: it propagates to the
/// owning call session, which tears the whole call down and closes the
/// counterpart channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Establishing the underlying connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Sending on the underlying transport failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving from the underlying transport failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// An outbound message could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The channel is already closed
    #[error("channel closed")]
    Closed,
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// One duplex structured-message stream to an external party.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Message type accepted by the send half.
    type Outbound: Send + 'static;

    /// Serialize and transmit one message.
    async fn send(&self, message: Self::Outbound) -> ChannelResult<()>;

    /// Whether the underlying transport is still open for sending.
    fn is_open(&self) -> bool;

    /// Close the send half. Idempotent.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChannelError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("connection failed"));

        let err = ChannelError::Closed;
        assert_eq!(err.to_string(), "channel closed");
    }
}
