//! Per-connection session lifecycle.
//!
//! Every connection moves through `Connected -> Registered -> Closed`,
//! and `Closed` is terminal. The handlers here are what the dispatch
//! table points at; they drive the registry and router and never touch
//! the transport directly, which keeps them testable without a socket.

use chatter_core::{ConnectionId, RegistryError};
use chatter_protocol::{ClientFrame, Envelope, EnvelopeKind};
use tracing::{debug, warn};

use crate::handlers::AppState;
use crate::metrics;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, no name bound yet.
    Connected,
    /// Display name bound; chat messages are relayed.
    Registered,
    /// Terminal. Nothing further is accepted or routed.
    Closed,
}

/// Per-connection session state.
#[derive(Debug)]
pub struct Session {
    /// The connection handle this session owns.
    pub id: ConnectionId,
    /// Current lifecycle state.
    pub state: SessionState,
}

impl Session {
    /// Create a session for a freshly accepted connection.
    #[must_use]
    pub fn new(id: impl Into<ConnectionId>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Connected,
        }
    }
}

/// Route an inbound frame through the dispatch table.
///
/// Frames for unknown destinations and frames arriving after close are
/// dropped; the connection stays open either way.
pub fn handle_frame(state: &AppState, session: &mut Session, frame: ClientFrame) {
    if session.state == SessionState::Closed {
        debug!(connection = %session.id, "Frame after close, dropped");
        return;
    }

    match state.dispatch.resolve(&frame.destination) {
        Some(handler) => handler(state, session, frame.envelope),
        None => {
            warn!(
                connection = %session.id,
                destination = %frame.destination,
                "Unknown destination, frame dropped"
            );
            metrics::record_dropped_frame("unknown_destination");
        }
    }
}

/// Handle the registration destination: bind the display name and
/// broadcast the JOIN notification.
pub fn handle_register(state: &AppState, session: &mut Session, envelope: Envelope) {
    if session.state != SessionState::Connected {
        warn!(connection = %session.id, "Repeat registration, frame dropped");
        metrics::record_dropped_frame("repeat_registration");
        return;
    }

    if envelope.kind != EnvelopeKind::Join {
        warn!(
            connection = %session.id,
            kind = ?envelope.kind,
            "Non-JOIN envelope on register destination, dropped"
        );
        metrics::record_dropped_frame("bad_registration");
        return;
    }

    let Some(name) = envelope.sender_name().map(str::to_string) else {
        warn!(connection = %session.id, "Registration without a display name, dropped");
        metrics::record_dropped_frame("bad_registration");
        return;
    };

    match state.registry.bind_name(&session.id, name.clone()) {
        Ok(()) => {
            session.state = SessionState::Registered;
            metrics::record_registration();

            let recipients = state.router.publish(Envelope::join(&name));
            metrics::record_broadcast(recipients);
            debug!(connection = %session.id, name = %name, recipients, "Registered");
        }
        // Handle vanished mid-handshake; drop the registration silently.
        Err(RegistryError::NotFound(_)) => {
            debug!(connection = %session.id, "Registration for removed connection, dropped");
        }
    }
}

/// Handle the send destination: relay a chat message to the live set.
pub fn handle_send(state: &AppState, session: &mut Session, envelope: Envelope) {
    if session.state != SessionState::Registered {
        debug!(connection = %session.id, "Chat before registration, dropped");
        metrics::record_dropped_frame("unregistered_chat");
        return;
    }

    match envelope.kind {
        EnvelopeKind::Chat => {}
        // LEAVE is always server-generated; never relay one from a client.
        EnvelopeKind::Leave => {
            warn!(connection = %session.id, "Client-sent LEAVE, dropped");
            metrics::record_dropped_frame("client_leave");
            return;
        }
        EnvelopeKind::Join => {
            warn!(connection = %session.id, "JOIN on send destination, dropped");
            metrics::record_dropped_frame("misrouted_join");
            return;
        }
    }

    let Some(sender) = envelope.sender_name() else {
        warn!(connection = %session.id, "CHAT without a sender, dropped");
        metrics::record_dropped_frame("anonymous_chat");
        return;
    };

    // Spoofed senders are forwarded unchanged to match the relay's
    // observable behavior; the mismatch is still worth surfacing.
    if let Some(bound) = state.registry.bound_name(&session.id) {
        if bound != sender {
            warn!(
                connection = %session.id,
                bound = %bound,
                claimed = %sender,
                "Chat sender does not match bound name"
            );
        }
    }

    let recipients = state.router.publish(envelope);
    metrics::record_broadcast(recipients);
}

/// Close the session: remove it from the registry and, if a name was
/// bound, broadcast the LEAVE notification exactly once.
pub fn close(state: &AppState, session: &mut Session) {
    if session.state == SessionState::Closed {
        return;
    }
    let was_registered = session.state == SessionState::Registered;
    session.state = SessionState::Closed;

    if let Some(name) = state.registry.unbind(&session.id) {
        if was_registered {
            metrics::record_deregistration();
        }
        let recipients = state.router.publish(Envelope::leave(&name));
        metrics::record_broadcast(recipients);
        debug!(connection = %session.id, name = %name, recipients, "Session closed");
    } else {
        debug!(connection = %session.id, "Unregistered session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::AppState;
    use chatter_core::Outbox;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn state() -> AppState {
        AppState::new(Config::default())
    }

    fn connect(state: &AppState) -> (Session, mpsc::UnboundedReceiver<Arc<Envelope>>) {
        let id = chatter_core::generate_connection_id();
        let (tx, rx): (Outbox, _) = mpsc::unbounded_channel();
        state.registry.register(id.clone(), tx);
        (Session::new(id), rx)
    }

    #[test]
    fn test_register_binds_and_broadcasts_join() {
        let state = state();
        let (mut session, mut rx) = connect(&state);

        handle_register(&state, &mut session, Envelope::join("alice"));

        assert_eq!(session.state, SessionState::Registered);
        assert_eq!(
            state.registry.bound_name(&session.id).as_deref(),
            Some("alice")
        );
        assert_eq!(*rx.try_recv().unwrap(), Envelope::join("alice"));
    }

    #[test]
    fn test_register_requires_join_kind() {
        let state = state();
        let (mut session, mut rx) = connect(&state);

        handle_register(&state, &mut session, Envelope::chat("alice", "hi"));

        assert_eq!(session.state, SessionState::Connected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_register_requires_display_name() {
        let state = state();
        let (mut session, mut rx) = connect(&state);

        let envelope = Envelope {
            content: None,
            sender: None,
            kind: EnvelopeKind::Join,
        };
        handle_register(&state, &mut session, envelope);

        assert_eq!(session.state, SessionState::Connected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_register_vanished_handle_dropped_silently() {
        let state = state();
        let mut session = Session::new("conn-gone");

        handle_register(&state, &mut session, Envelope::join("alice"));

        assert_eq!(session.state, SessionState::Connected);
        assert!(state.registry.is_empty());
    }

    #[test]
    fn test_repeat_registration_dropped() {
        let state = state();
        let (mut session, mut rx) = connect(&state);

        handle_register(&state, &mut session, Envelope::join("alice"));
        let _join = rx.try_recv().unwrap();

        handle_register(&state, &mut session, Envelope::join("mallory"));

        assert_eq!(
            state.registry.bound_name(&session.id).as_deref(),
            Some("alice")
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_chat_before_registration_dropped() {
        let state = state();
        let (mut session, mut rx) = connect(&state);

        handle_send(&state, &mut session, Envelope::chat("alice", "hi"));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_chat_relayed_verbatim() {
        let state = state();
        let (mut session, mut rx) = connect(&state);
        handle_register(&state, &mut session, Envelope::join("alice"));
        let _join = rx.try_recv().unwrap();

        let envelope = Envelope::chat("alice", "hi everyone");
        handle_send(&state, &mut session, envelope.clone());

        assert_eq!(*rx.try_recv().unwrap(), envelope);
    }

    #[test]
    fn test_spoofed_sender_still_relayed() {
        let state = state();
        let (mut session, mut rx) = connect(&state);
        handle_register(&state, &mut session, Envelope::join("alice"));
        let _join = rx.try_recv().unwrap();

        handle_send(&state, &mut session, Envelope::chat("mallory", "hi"));

        assert_eq!(
            rx.try_recv().unwrap().sender.as_deref(),
            Some("mallory")
        );
    }

    #[test]
    fn test_client_sent_leave_dropped() {
        let state = state();
        let (mut session, mut rx) = connect(&state);
        handle_register(&state, &mut session, Envelope::join("alice"));
        let _join = rx.try_recv().unwrap();

        handle_send(&state, &mut session, Envelope::leave("alice"));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_close_broadcasts_leave_once() {
        let state = state();
        let (mut session, _rx) = connect(&state);
        let (mut peer, mut peer_rx) = connect(&state);
        handle_register(&state, &mut session, Envelope::join("alice"));
        handle_register(&state, &mut peer, Envelope::join("bob"));
        while peer_rx.try_recv().is_ok() {}

        close(&state, &mut session);
        close(&state, &mut session); // terminal, second close is a no-op

        assert_eq!(*peer_rx.try_recv().unwrap(), Envelope::leave("alice"));
        assert!(peer_rx.try_recv().is_err());
        assert_eq!(session.state, SessionState::Closed);
    }

    #[test]
    fn test_close_before_registration_is_silent() {
        let state = state();
        let (mut session, _rx) = connect(&state);
        let (mut peer, mut peer_rx) = connect(&state);
        handle_register(&state, &mut peer, Envelope::join("bob"));
        while peer_rx.try_recv().is_ok() {}

        close(&state, &mut session);

        assert!(peer_rx.try_recv().is_err());
        assert!(!state
            .registry
            .live_handles()
            .contains(&session.id));
    }

    #[test]
    fn test_frame_after_close_dropped() {
        let state = state();
        let (mut session, _rx) = connect(&state);
        close(&state, &mut session);

        let frame = ClientFrame {
            destination: chatter_protocol::wire::destinations::REGISTER.to_string(),
            envelope: Envelope::join("alice"),
        };
        handle_frame(&state, &mut session, frame);

        assert!(state.registry.is_empty());
        assert_eq!(session.state, SessionState::Closed);
    }

    #[test]
    fn test_unknown_destination_dropped() {
        let state = state();
        let (mut session, mut rx) = connect(&state);

        let frame = ClientFrame {
            destination: "/chat.shout".to_string(),
            envelope: Envelope::chat("alice", "hi"),
        };
        handle_frame(&state, &mut session, frame);

        assert_eq!(session.state, SessionState::Connected);
        assert!(rx.try_recv().is_err());
    }
}
