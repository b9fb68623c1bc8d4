//! Route configuration
//!
//! - `api` - Health check and call-control endpoints
//! - `media` - Media-stream WebSocket endpoint

pub mod api;
pub mod media;
