//! # chatter-server
//!
//! The Chatter relay server: session lifecycle, destination dispatch,
//! WebSocket glue, configuration, and metrics around `chatter-core`.

pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod metrics;
pub mod session;
