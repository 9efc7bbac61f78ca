//! The message envelope exchanged between clients and the relay.
//!
//! Envelopes are immutable values: constructed once, then cloned or shared
//! as-is through the router.

use serde::{Deserialize, Serialize};

/// Envelope kinds. Serialized as the wire `type` field.
///
/// This is a closed set; an unknown string on the wire is a decode error,
/// never an open passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvelopeKind {
    /// A user-authored chat message.
    Chat,
    /// Membership notification: a user joined. Sent by clients as the
    /// registration payload, broadcast by the server once the name is bound.
    Join,
    /// Membership notification: a user left. Always server-generated.
    Leave,
}

/// A single message on the shared topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Text body. Empty for JOIN/LEAVE notifications.
    pub content: Option<String>,
    /// Display name of the originating user.
    pub sender: Option<String>,
    /// Envelope kind.
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
}

impl Envelope {
    /// Create a chat envelope.
    #[must_use]
    pub fn chat(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            sender: Some(sender.into()),
            kind: EnvelopeKind::Chat,
        }
    }

    /// Create the JOIN notification broadcast after a successful registration.
    #[must_use]
    pub fn join(sender: impl Into<String>) -> Self {
        Self {
            content: Some(String::new()),
            sender: Some(sender.into()),
            kind: EnvelopeKind::Join,
        }
    }

    /// Create the LEAVE notification broadcast when a named connection closes.
    #[must_use]
    pub fn leave(sender: impl Into<String>) -> Self {
        Self {
            content: Some(String::new()),
            sender: Some(sender.into()),
            kind: EnvelopeKind::Leave,
        }
    }

    /// The sender as a non-empty string, if one is present.
    #[must_use]
    pub fn sender_name(&self) -> Option<&str> {
        self.sender.as_deref().filter(|s| !s.is_empty())
    }
}
