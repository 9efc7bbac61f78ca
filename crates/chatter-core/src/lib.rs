//! # chatter-core
//!
//! Connection registry and broadcast routing for the Chatter relay.
//!
//! This crate is the stateful heart of the relay:
//!
//! - **Registry** - The live connection set, each entry pairing an outbox
//!   with an optionally bound display name
//! - **Router** - Fans an envelope out to every live connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Connection │────▶│   Router    │────▶│  Registry   │
//! │    task     │     │  (fan-out)  │     │ (live set)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                         per-connection
//!                                            outboxes
//! ```
//!
//! The registry performs no I/O; delivery happens through the outbox
//! senders it hands to the router.

pub mod registry;
pub mod router;

pub use registry::{generate_connection_id, ConnectionId, Outbox, Registry, RegistryError};
pub use router::Router;
