//! Broadcast routing.
//!
//! The router fans every published envelope out to the full live set. It
//! snapshots the registry before iterating, so connections joining or
//! leaving mid-broadcast cannot break the loop; a new joiner may miss a
//! broadcast already in flight.

use std::sync::Arc;

use chatter_protocol::Envelope;
use tracing::{trace, warn};

use crate::registry::Registry;

/// The broadcast router.
///
/// Publishing never fails from the sender's point of view: a recipient
/// whose outbox is gone (connection torn down between snapshot and send)
/// is logged and skipped, and delivery continues with the rest of the
/// live set. Envelopes published from a single connection task arrive at
/// every recipient in publish order; there is no cross-sender ordering.
pub struct Router {
    registry: Arc<Registry>,
}

impl Router {
    /// Create a router over the given registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Deliver an envelope to every live connection.
    ///
    /// Returns the number of recipients actually delivered to, for
    /// logging and metrics only; per-recipient failures are never
    /// surfaced to the sender.
    pub fn publish(&self, envelope: Envelope) -> usize {
        let envelope = Arc::new(envelope);
        let targets = self.registry.outboxes();

        let mut delivered = 0;
        for (id, outbox) in targets {
            if outbox.send(Arc::clone(&envelope)).is_err() {
                warn!(connection = %id, "Delivery failed, recipient gone");
            } else {
                delivered += 1;
            }
        }

        trace!(kind = ?envelope.kind, recipients = delivered, "Broadcast");
        delivered
    }
}
