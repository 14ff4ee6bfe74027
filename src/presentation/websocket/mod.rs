//! WebSocket Relay
//!
//! Live delivery of chat events to connected browsers.

pub mod messages;
pub mod relay;

pub use messages::{ClientFrame, ServerFrame};
pub use relay::ws_handler;
