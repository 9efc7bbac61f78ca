//! # chatter-protocol
//!
//! Wire types for the Chatter broadcast relay.
//!
//! The unit of exchange is the [`Envelope`], a small JSON value shared by the
//! wire and the in-process routing layer:
//!
//! ```json
//! { "content": "hi", "sender": "alice", "type": "CHAT" }
//! ```
//!
//! `type` is a closed set (`CHAT`, `JOIN`, `LEAVE`); anything else fails
//! decoding. Inbound frames pair an envelope with a routing destination,
//! outbound broadcasts are tagged with the shared topic.
//!
//! ## Example
//!
//! ```rust
//! use chatter_protocol::{wire, Envelope};
//!
//! let frame = wire::decode_client(
//!     r#"{"destination":"/chat.send","content":"hi","sender":"alice","type":"CHAT"}"#,
//! ).unwrap();
//! assert_eq!(frame.destination, wire::destinations::SEND);
//!
//! let text = wire::encode_broadcast(&Envelope::join("alice")).unwrap();
//! assert!(text.contains("/topic/public"));
//! ```

pub mod envelope;
pub mod wire;

pub use envelope::{Envelope, EnvelopeKind};
pub use wire::{decode_client, encode_broadcast, ClientFrame, ProtocolError};
