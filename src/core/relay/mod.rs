//! The per-call relay: the timing/interruption state machine and the session
//! wiring that feeds it.

pub mod controller;
pub mod session;

pub use controller::{RelayControl, RelayController};
pub use session::CallSession;
