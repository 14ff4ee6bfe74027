//! Presentation Layer
//!
//! HTTP routes, middleware and the WebSocket relay.

pub mod http;
pub mod middleware;
pub mod websocket;
