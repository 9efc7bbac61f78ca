//! JSON framing for the relay's routing surface.
//!
//! Clients address one of two inbound destinations (register, send) and
//! receive every broadcast on the single shared topic. A frame is the
//! envelope plus its destination, flattened into one JSON object.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::Envelope;

/// Routing destinations, preserved verbatim for client compatibility.
pub mod destinations {
    /// Inbound: bind a display name to the connection.
    pub const REGISTER: &str = "/chat.register";
    /// Inbound: relay a chat message.
    pub const SEND: &str = "/chat.send";
    /// Outbound: the shared topic every connection subscribes to.
    pub const TOPIC_PUBLIC: &str = "/topic/public";
}

/// Protocol errors raised while framing or parsing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload does not parse into a frame (bad JSON, missing fields,
    /// or a `type` outside the closed set).
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// An inbound frame: a destination plus the envelope addressed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Target destination (`/chat.register` or `/chat.send`).
    pub destination: String,
    /// The envelope body.
    #[serde(flatten)]
    pub envelope: Envelope,
}

/// An outbound frame tagged with the broadcast topic.
#[derive(Debug, Serialize)]
struct BroadcastFrame<'a> {
    destination: &'static str,
    #[serde(flatten)]
    envelope: &'a Envelope,
}

/// Decode an inbound text payload into a [`ClientFrame`].
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the payload is not a valid frame.
/// Callers drop the frame and keep the connection open.
pub fn decode_client(text: &str) -> Result<ClientFrame, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode an envelope as a broadcast on the shared topic.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialization fails, which for
/// these value types means a bug rather than bad input.
pub fn encode_broadcast(envelope: &Envelope) -> Result<String, ProtocolError> {
    let frame = BroadcastFrame {
        destination: destinations::TOPIC_PUBLIC,
        envelope,
    };
    Ok(serde_json::to_string(&frame)?)
}
