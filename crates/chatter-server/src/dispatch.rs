//! Destination dispatch.
//!
//! Inbound frames carry a destination string; the table below maps each
//! destination to its handler. It is built once at startup and lives in
//! the shared app state, so routing a frame is a single lookup.

use std::collections::HashMap;

use chatter_protocol::wire::destinations;
use chatter_protocol::Envelope;

use crate::handlers::AppState;
use crate::session::{self, Session};

/// A destination handler.
pub type HandlerFn = fn(&AppState, &mut Session, Envelope);

/// The destination -> handler table.
pub struct Dispatch {
    routes: HashMap<&'static str, HandlerFn>,
}

impl Dispatch {
    /// Build the dispatch table with the relay's two inbound destinations.
    #[must_use]
    pub fn new() -> Self {
        let mut routes: HashMap<&'static str, HandlerFn> = HashMap::new();
        routes.insert(destinations::REGISTER, session::handle_register);
        routes.insert(destinations::SEND, session::handle_send);
        Self { routes }
    }

    /// Look up the handler for a destination.
    #[must_use]
    pub fn resolve(&self, destination: &str) -> Option<HandlerFn> {
        self.routes.get(destination).copied()
    }

    /// The destinations this table routes.
    #[must_use]
    pub fn destinations(&self) -> Vec<&'static str> {
        self.routes.keys().copied().collect()
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::new()
    }
}
