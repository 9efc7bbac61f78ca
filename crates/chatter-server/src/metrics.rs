//! Metrics collection and export for the relay.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use std::net::SocketAddr;
use tracing::info;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "chatter_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "chatter_connections_active";
    pub const ENVELOPES_TOTAL: &str = "chatter_envelopes_total";
    pub const ENVELOPE_BYTES: &str = "chatter_envelope_bytes";
    pub const BROADCAST_RECIPIENTS_TOTAL: &str = "chatter_broadcast_recipients_total";
    pub const FRAMES_DROPPED_TOTAL: &str = "chatter_frames_dropped_total";
    pub const REGISTERED_USERS: &str = "chatter_registered_users";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::ENVELOPES_TOTAL, "Total number of envelopes processed");
    metrics::describe_counter!(names::ENVELOPE_BYTES, "Total bytes of envelopes processed");
    metrics::describe_counter!(
        names::BROADCAST_RECIPIENTS_TOTAL,
        "Total per-recipient deliveries across all broadcasts"
    );
    metrics::describe_counter!(
        names::FRAMES_DROPPED_TOTAL,
        "Total inbound frames dropped without routing"
    );
    metrics::describe_gauge!(
        names::REGISTERED_USERS,
        "Current number of connections with a bound display name"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record an envelope passing through the relay.
pub fn record_envelope(bytes: usize, direction: &str) {
    counter!(names::ENVELOPES_TOTAL, "direction" => direction.to_string()).increment(1);
    counter!(names::ENVELOPE_BYTES, "direction" => direction.to_string()).increment(bytes as u64);
}

/// Record the recipient count of a broadcast.
pub fn record_broadcast(recipients: usize) {
    counter!(names::BROADCAST_RECIPIENTS_TOTAL).increment(recipients as u64);
}

/// Record an inbound frame dropped without routing.
pub fn record_dropped_frame(reason: &str) {
    counter!(names::FRAMES_DROPPED_TOTAL, "reason" => reason.to_string()).increment(1);
}

/// Update the registered-user gauge.
pub fn record_registration() {
    gauge!(names::REGISTERED_USERS).increment(1.0);
}

/// Record a registered connection going away.
pub fn record_deregistration() {
    gauge!(names::REGISTERED_USERS).decrement(1.0);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
